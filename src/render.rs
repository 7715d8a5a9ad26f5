//! Render composition and pipeline batching.
//!
//! Each frame the scene context describes what it wants drawn as a [`Render`]
//! tree. [`Render::batch`] flattens the tree into a [`FramePacket`] with one
//! list per pipeline, sorting translucent draws back to front so the
//! transparent pipeline can blend without depth writes.
//!
//! # Variants
//!
//! - `None` renders nothing
//! - `Opaque(DrawItem)` / `Opaques(Vec<DrawItem>)` go through the depth-tested mesh pipeline
//! - `Transparent(DrawItem)` / `Transparents(Vec<DrawItem>)` are alpha blended after opaque geometry
//! - `Points(PointsDraw)` renders a particle cloud additively, last
//! - `Composed(Vec<Render>)` recursively batches a composition of renders

use cgmath::{InnerSpace, Point3};

use crate::{
    backend::{DrawItem, FramePacket, PointsDraw},
    camera::CameraUniform,
    pipelines::light::LightUniform,
};

#[derive(Clone, Debug)]
pub enum Render {
    None,
    Opaque(DrawItem),
    Opaques(Vec<DrawItem>),
    Transparent(DrawItem),
    Transparents(Vec<DrawItem>),
    Points(PointsDraw),
    Composed(Vec<Render>),
}

impl Render {
    fn set_pipelines(self, opaque: &mut Vec<DrawItem>, trans: &mut Vec<DrawItem>, points: &mut Vec<PointsDraw>) {
        match self {
            Render::None => (),
            Render::Opaque(item) => opaque.push(item),
            Render::Opaques(items) => opaque.extend(items),
            Render::Transparent(item) => trans.push(item),
            Render::Transparents(items) => trans.extend(items),
            Render::Points(draw) => {
                if draw.count > 0 {
                    points.push(draw)
                }
            }
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(opaque, trans, points)),
        }
    }

    /// Flattens this render tree into a frame.
    pub fn batch(self, clear: [f32; 4], camera: CameraUniform, lights: LightUniform) -> FramePacket {
        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        let mut points = Vec::new();
        self.set_pipelines(&mut opaque, &mut transparent, &mut points);

        let [ex, ey, ez, _] = camera.view_position;
        let eye = Point3::new(ex, ey, ez);
        let depth = |item: &DrawItem| (Point3::from(item.translation()) - eye).magnitude2();
        transparent.sort_by(|a, b| depth(b).total_cmp(&depth(a)));

        FramePacket {
            clear,
            camera,
            lights,
            opaque,
            transparent,
            points,
            post_processing: false,
        }
    }
}

impl From<Vec<Render>> for Render {
    fn from(renders: Vec<Render>) -> Self {
        Render::Composed(renders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{GeometryHandle, MaterialHandle, PointsHandle},
        data_structures::instance::Instance,
        particles::ParticleUniform,
    };

    fn item(id: u32, z: f32) -> DrawItem {
        DrawItem {
            geometry: GeometryHandle(id),
            material: MaterialHandle(id),
            transform: Instance::at(0.0, 0.0, z).to_raw(),
        }
    }

    #[test]
    fn composed_renders_land_in_their_pipelines() {
        let points = PointsDraw {
            points: PointsHandle(9),
            count: 10,
            uniform: ParticleUniform::new(0.05),
        };
        let empty = PointsDraw { count: 0, ..points };
        let render = Render::Composed(vec![
            Render::Opaque(item(1, 0.0)),
            Render::None,
            Render::Composed(vec![Render::Opaques(vec![item(2, 0.0), item(3, 0.0)]), Render::Points(empty)]),
            Render::Transparent(item(4, 0.0)),
            Render::Points(points),
        ]);
        let frame = render.batch([0.0; 4], CameraUniform::new(), LightUniform::default());
        assert_eq!(frame.opaque.len(), 3);
        assert_eq!(frame.transparent.len(), 1);
        assert_eq!(frame.points.len(), 1);
        assert_eq!(frame.draw_count(), 5);
    }

    #[test]
    fn transparent_draws_are_sorted_back_to_front() {
        let mut camera = CameraUniform::new();
        camera.view_position = [0.0, 0.0, 10.0, 1.0];
        let render = Render::Transparents(vec![item(1, 5.0), item(2, -5.0), item(3, 0.0)]);
        let frame = render.batch([0.0; 4], camera, LightUniform::default());
        let order: Vec<u32> = frame.transparent.iter().map(|i| i.geometry.0).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }
}
