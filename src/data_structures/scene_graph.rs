//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena owned by [`SceneGraph`] and are addressed by
//! [`NodeId`]. A node is either a plain group or a mesh (geometry plus
//! material). Per-node animation parameters and GPU handles are deliberately
//! not stored here; they live in side tables keyed by `NodeId` so the render
//! resource and its logic state can be disposed independently.
//!
//! Nodes can only be appended below an existing parent, so the arena order is
//! always parent-before-child. World transforms are therefore resolved in a
//! single forward pass.

use log::warn;

use crate::data_structures::{instance::Instance, material::Material, mesh::MeshData};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct MeshNode {
    pub mesh: MeshData,
    pub material: Material,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub local: Instance,
    pub visible: bool,
    pub kind: NodeKind,
    world: Instance,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn world(&self) -> &Instance {
        &self.world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new(name: &str) -> Self {
        Self {
            nodes: vec![SceneNode {
                name: name.to_string(),
                local: Instance::new(),
                visible: true,
                kind: NodeKind::Group,
                world: Instance::new(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn add_group(&mut self, parent: NodeId, name: &str, local: Instance) -> NodeId {
        self.push(parent, name, local, NodeKind::Group)
    }

    pub fn add_mesh(
        &mut self,
        parent: NodeId,
        name: &str,
        mesh: MeshData,
        material: Material,
        local: Instance,
    ) -> NodeId {
        self.push(parent, name, local, NodeKind::Mesh(MeshNode { mesh, material }))
    }

    fn push(&mut self, parent: NodeId, name: &str, local: Instance, kind: NodeKind) -> NodeId {
        let parent = if parent.index() < self.nodes.len() {
            parent
        } else {
            warn!(
                "Parent {:?} does not exist (graph has {} nodes), attaching '{}' to the root.",
                parent,
                self.nodes.len(),
                name
            );
            self.root()
        };
        let id = NodeId(self.nodes.len() as u32);
        let world = &self.nodes[parent.index()].world * &local;
        self.nodes.push(SceneNode {
            name: name.to_string(),
            local,
            visible: true,
            kind,
            world,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn local_transform(&self, id: NodeId) -> Option<Instance> {
        self.get(id).map(|node| node.local)
    }

    pub fn set_local_transform(&mut self, id: NodeId, instance: Instance) {
        match self.nodes.get_mut(id.index()) {
            Some(node) => node.local = instance,
            None => warn!("You tried to transform {:?}, which is not part of this graph.", id),
        }
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(|idx| NodeId(idx as u32))
    }

    /// Recomputes every world transform from the local transforms, root first.
    pub fn update_world_transforms(&mut self) {
        for idx in 0..self.nodes.len() {
            let world = match self.nodes[idx].parent {
                Some(parent) => &self.nodes[parent.index()].world * &self.nodes[idx].local,
                None => self.nodes[idx].local,
            };
            self.nodes[idx].world = world;
        }
    }

    /// Depth-first traversal starting at the root.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse {
            graph: self,
            stack: vec![self.root()],
        }
    }

    /// Visible mesh nodes (a hidden group hides its whole subtree).
    pub fn visible_meshes(&self) -> Vec<(NodeId, &MeshNode, &Instance)> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            if !node.visible {
                continue;
            }
            if let NodeKind::Mesh(mesh) = &node.kind {
                out.push((id, mesh, &node.world));
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.mesh().is_some()).count()
    }

    pub fn vertex_count(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(SceneNode::mesh)
            .map(|mesh| mesh.mesh.vertex_count())
            .sum()
    }
}

pub struct Traverse<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = (NodeId, &'a SceneNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.graph.get(id)?;
        self.stack.extend(node.children.iter().rev());
        Some((id, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;

    fn cube() -> MeshData {
        primitives::cuboid(1.0, 1.0, 1.0)
    }

    #[test]
    fn traversal_visits_parents_before_children() {
        let mut graph = SceneGraph::new("root");
        let group = graph.add_group(graph.root(), "group", Instance::at(0.0, 1.0, 0.0));
        let a = graph.add_mesh(group, "a", cube(), Material::flat("a", [1.0; 3]), Instance::new());
        let b = graph.add_mesh(graph.root(), "b", cube(), Material::flat("b", [1.0; 3]), Instance::new());
        let order: Vec<_> = graph.traverse().map(|(id, _)| id).collect();
        assert_eq!(order, vec![graph.root(), group, a, b]);
        assert_eq!(graph.mesh_count(), 2);
    }

    #[test]
    fn world_transforms_follow_parents() {
        let mut graph = SceneGraph::new("root");
        let group = graph.add_group(graph.root(), "group", Instance::new());
        let child = graph.add_mesh(group, "child", cube(), Material::flat("c", [1.0; 3]), Instance::at(1.0, 0.0, 0.0));
        graph.set_local_transform(group, Instance::at(0.0, 2.0, 0.0).with_uniform_scale(3.0));
        graph.update_world_transforms();
        let world = graph.get(child).unwrap().world();
        assert!((world.position.x - 3.0).abs() < 1e-6);
        assert!((world.position.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn hidden_groups_hide_their_subtree() {
        let mut graph = SceneGraph::new("root");
        let group = graph.add_group(graph.root(), "group", Instance::new());
        graph.add_mesh(group, "child", cube(), Material::flat("c", [1.0; 3]), Instance::new());
        graph.add_mesh(graph.root(), "other", cube(), Material::flat("o", [1.0; 3]), Instance::new());
        graph.get_mut(group).unwrap().visible = false;
        let names: Vec<_> = graph
            .visible_meshes()
            .into_iter()
            .map(|(id, _, _)| graph.get(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["other".to_string()]);
    }
}
