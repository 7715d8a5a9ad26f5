//! Parametric primitive meshes.
//!
//! Segment counts and subdivision levels are the only inputs that change the
//! vertex count, and every builder is monotonic in them: more segments never
//! yield fewer vertices. Front faces wind counter-clockwise.

use std::f32::consts::{PI, TAU};

use cgmath::{Vector3, VectorSpace};

use crate::data_structures::mesh::{MeshData, normalize_or_up};

/// Axis-aligned box centred at the origin, 24 vertices (flat normals per face).
pub fn cuboid(width: f32, height: f32, depth: f32) -> MeshData {
    let (hw, hh, hd) = (width * 0.5, height * 0.5, depth * 0.5);
    // (normal, u axis, v axis) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let half = Vector3::new(hw, hh, hd);
    let mut mesh = MeshData::new();
    for (normal, u, v) in faces {
        let n = Vector3::from(normal);
        let u = Vector3::from(u);
        let v = Vector3::from(v);
        let corner = |su: f32, sv: f32| {
            let p = n + u * su + v * sv;
            [p.x * half.x, p.y * half.y, p.z * half.z]
        };
        let a = mesh.push_vertex(corner(-1.0, -1.0), normal, [0.0, 1.0]);
        let b = mesh.push_vertex(corner(1.0, -1.0), normal, [1.0, 1.0]);
        let c = mesh.push_vertex(corner(1.0, 1.0), normal, [1.0, 0.0]);
        let d = mesh.push_vertex(corner(-1.0, 1.0), normal, [0.0, 0.0]);
        mesh.push_triangle(a, b, c);
        mesh.push_triangle(a, c, d);
    }
    mesh
}

/// Rectangle in the XY plane facing +Z.
pub fn plane(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let n = [0.0, 0.0, 1.0];
    let mut mesh = MeshData::new();
    let a = mesh.push_vertex([-hw, -hh, 0.0], n, [0.0, 1.0]);
    let b = mesh.push_vertex([hw, -hh, 0.0], n, [1.0, 1.0]);
    let c = mesh.push_vertex([hw, hh, 0.0], n, [1.0, 0.0]);
    let d = mesh.push_vertex([-hw, hh, 0.0], n, [0.0, 0.0]);
    mesh.push_triangle(a, b, c);
    mesh.push_triangle(a, c, d);
    mesh
}

/// Filled disc in the XZ plane facing +Y.
pub fn disc(radius: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let up = [0.0, 1.0, 0.0];
    let mut mesh = MeshData::new();
    let center = mesh.push_vertex([0.0, 0.0, 0.0], up, [0.5, 0.5]);
    for s in 0..=segments {
        let theta = s as f32 / segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        mesh.push_vertex(
            [radius * sin, 0.0, radius * cos],
            up,
            [0.5 + 0.5 * sin, 0.5 - 0.5 * cos],
        );
    }
    for s in 0..segments {
        mesh.push_triangle(center, center + 1 + s, center + 2 + s);
    }
    mesh
}

/// Flat annulus in the XZ plane facing +Y.
pub fn annulus(inner: f32, outer: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let up = [0.0, 1.0, 0.0];
    let mut mesh = MeshData::new();
    for s in 0..=segments {
        let u = s as f32 / segments as f32;
        let (sin, cos) = (u * TAU).sin_cos();
        mesh.push_vertex([inner * sin, 0.0, inner * cos], up, [u, 0.0]);
        mesh.push_vertex([outer * sin, 0.0, outer * cos], up, [u, 1.0]);
    }
    for s in 0..segments {
        let i0 = s * 2;
        let (o0, i1, o1) = (i0 + 1, i0 + 2, i0 + 3);
        mesh.push_triangle(i0, o0, o1);
        mesh.push_triangle(i0, o1, i1);
    }
    mesh
}

/// Capped cylinder (or cone when one radius is zero) centred at the origin along Y.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> MeshData {
    let radial = radial_segments.max(3);
    let half = height * 0.5;
    let slope = if height.abs() > f32::EPSILON {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };
    let mut mesh = MeshData::new();

    let mut rows = [Vec::new(), Vec::new()];
    for (row, v) in [0.0f32, 1.0].into_iter().enumerate() {
        let radius = v * (radius_bottom - radius_top) + radius_top;
        for x in 0..=radial {
            let u = x as f32 / radial as f32;
            let (sin, cos) = (u * TAU).sin_cos();
            let normal = normalize_or_up(Vector3::new(sin, slope, cos));
            rows[row].push(mesh.push_vertex(
                [radius * sin, -v * height + half, radius * cos],
                normal.into(),
                [u, v],
            ));
        }
    }
    for x in 0..radial as usize {
        let a = rows[0][x];
        let b = rows[1][x];
        let c = rows[1][x + 1];
        let d = rows[0][x + 1];
        mesh.push_triangle(a, b, d);
        mesh.push_triangle(b, c, d);
    }

    for top in [true, false] {
        let radius = if top { radius_top } else { radius_bottom };
        if radius <= 0.0 {
            continue;
        }
        let sign = if top { 1.0 } else { -1.0 };
        let y = half * sign;
        let normal = [0.0, sign, 0.0];
        let center = mesh.push_vertex([0.0, y, 0.0], normal, [0.5, 0.5]);
        let start = mesh.vertices.len() as u32;
        for x in 0..=radial {
            let u = x as f32 / radial as f32;
            let (sin, cos) = (u * TAU).sin_cos();
            mesh.push_vertex(
                [radius * sin, y, radius * cos],
                normal,
                [0.5 + 0.5 * sin, 0.5 + 0.5 * cos * sign],
            );
        }
        for x in 0..radial {
            let i = start + x;
            if top {
                mesh.push_triangle(i, i + 1, center);
            } else {
                mesh.push_triangle(i + 1, i, center);
            }
        }
    }
    mesh
}

/// UV sphere.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let w = width_segments.max(3);
    let h = height_segments.max(2);
    let mut mesh = MeshData::new();
    let mut grid = Vec::with_capacity(h as usize + 1);
    for iy in 0..=h {
        let v = iy as f32 / h as f32;
        let mut row = Vec::with_capacity(w as usize + 1);
        for ix in 0..=w {
            let u = ix as f32 / w as f32;
            let p = Vector3::new(
                -radius * (u * TAU).cos() * (v * PI).sin(),
                radius * (v * PI).cos(),
                radius * (u * TAU).sin() * (v * PI).sin(),
            );
            row.push(mesh.push_vertex(p.into(), normalize_or_up(p).into(), [u, 1.0 - v]));
        }
        grid.push(row);
    }
    for iy in 0..h as usize {
        for ix in 0..w as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            if iy != 0 {
                mesh.push_triangle(a, b, d);
            }
            if iy != h as usize - 1 {
                mesh.push_triangle(b, c, d);
            }
        }
    }
    mesh
}

/// Torus around the Z axis; `arc` below `TAU` opens it.
pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32, arc: f32) -> MeshData {
    let radial = radial_segments.max(3);
    let tubular = tubular_segments.max(3);
    let mut mesh = MeshData::new();
    for j in 0..=radial {
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * arc;
            let v = j as f32 / radial as f32 * TAU;
            let p = Vector3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let center = Vector3::new(radius * u.cos(), radius * u.sin(), 0.0);
            mesh.push_vertex(
                p.into(),
                normalize_or_up(p - center).into(),
                [i as f32 / tubular as f32, j as f32 / radial as f32],
            );
        }
    }
    for j in 1..=radial {
        for i in 1..=tubular {
            let a = (tubular + 1) * j + i - 1;
            let b = (tubular + 1) * (j - 1) + i - 1;
            let c = (tubular + 1) * (j - 1) + i;
            let d = (tubular + 1) * j + i;
            mesh.push_triangle(a, b, d);
            mesh.push_triangle(b, c, d);
        }
    }
    mesh
}

/// (p, q) torus knot swept by a circular tube.
pub fn torus_knot(
    radius: f32,
    tube: f32,
    tubular_segments: u32,
    radial_segments: u32,
    p: u32,
    q: u32,
) -> MeshData {
    let tubular = tubular_segments.max(3);
    let radial = radial_segments.max(3);
    let (pf, qf) = (p.max(1) as f32, q.max(1) as f32);
    let curve = |u: f32| {
        let quo = qf / pf * u;
        let cs = quo.cos();
        Vector3::new(
            radius * (2.0 + cs) * 0.5 * u.cos(),
            radius * (2.0 + cs) * 0.5 * u.sin(),
            radius * quo.sin() * 0.5,
        )
    };
    let mut mesh = MeshData::new();
    for i in 0..=tubular {
        let u = i as f32 / tubular as f32 * pf * TAU;
        let p1 = curve(u);
        let p2 = curve(u + 0.01);
        let t = p2 - p1;
        let n = p2 + p1;
        let b = normalize_or_up(t.cross(n));
        let n = normalize_or_up(b.cross(t));
        for j in 0..=radial {
            let v = j as f32 / radial as f32 * TAU;
            let cx = -tube * v.cos();
            let cy = tube * v.sin();
            let vertex = p1 + n * cx + b * cy;
            mesh.push_vertex(
                vertex.into(),
                normalize_or_up(vertex - p1).into(),
                [i as f32 / tubular as f32, j as f32 / radial as f32],
            );
        }
    }
    for j in 1..=tubular {
        for i in 1..=radial {
            let a = (radial + 1) * (j - 1) + (i - 1);
            let b = (radial + 1) * j + (i - 1);
            let c = (radial + 1) * j + i;
            let d = (radial + 1) * (j - 1) + i;
            mesh.push_triangle(a, b, d);
            mesh.push_triangle(b, c, d);
        }
    }
    mesh
}

const GOLDEN: f32 = 1.618_034;

const ICOSAHEDRON_VERTICES: [[f32; 3]; 12] = [
    [-1.0, GOLDEN, 0.0],
    [1.0, GOLDEN, 0.0],
    [-1.0, -GOLDEN, 0.0],
    [1.0, -GOLDEN, 0.0],
    [0.0, -1.0, GOLDEN],
    [0.0, 1.0, GOLDEN],
    [0.0, -1.0, -GOLDEN],
    [0.0, 1.0, -GOLDEN],
    [GOLDEN, 0.0, -1.0],
    [GOLDEN, 0.0, 1.0],
    [-GOLDEN, 0.0, -1.0],
    [-GOLDEN, 0.0, 1.0],
];

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

const OCTAHEDRON_VERTICES: [[f32; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

const OCTAHEDRON_FACES: [[usize; 3]; 8] = [
    [0, 2, 4],
    [0, 4, 3],
    [0, 3, 5],
    [0, 5, 2],
    [1, 2, 5],
    [1, 5, 3],
    [1, 3, 4],
    [1, 4, 2],
];

pub fn icosahedron(radius: f32, detail: u32) -> MeshData {
    polyhedron(&ICOSAHEDRON_VERTICES, &ICOSAHEDRON_FACES, radius, detail)
}

pub fn octahedron(radius: f32, detail: u32) -> MeshData {
    polyhedron(&OCTAHEDRON_VERTICES, &OCTAHEDRON_FACES, radius, detail)
}

/// Subdivides every face into `(detail + 1)^2` triangles and projects the
/// result onto the sphere of `radius`. Vertices are not shared between
/// triangles, so the count is `3 * faces * (detail + 1)^2`.
fn polyhedron(vertices: &[[f32; 3]], faces: &[[usize; 3]], radius: f32, detail: u32) -> MeshData {
    let mut mesh = MeshData::new();
    let cols = detail as usize + 1;
    for face in faces {
        let a = Vector3::from(vertices[face[0]]);
        let b = Vector3::from(vertices[face[1]]);
        let c = Vector3::from(vertices[face[2]]);

        let mut grid: Vec<Vec<Vector3<f32>>> = Vec::with_capacity(cols + 1);
        for i in 0..=cols {
            let t = i as f32 / cols as f32;
            let aj = a.lerp(c, t);
            let bj = b.lerp(c, t);
            let rows = cols - i;
            let row = (0..=rows)
                .map(|j| {
                    if j == 0 && i == cols {
                        aj
                    } else {
                        aj.lerp(bj, j as f32 / rows as f32)
                    }
                })
                .collect();
            grid.push(row);
        }

        for i in 0..cols {
            for j in 0..(2 * (cols - i) - 1) {
                let k = j / 2;
                let tri = if j % 2 == 0 {
                    [grid[i][k + 1], grid[i + 1][k], grid[i][k]]
                } else {
                    [grid[i][k + 1], grid[i + 1][k + 1], grid[i + 1][k]]
                };
                let ids: Vec<u32> = tri
                    .iter()
                    .map(|p| {
                        let n = normalize_or_up(*p);
                        let uv = [
                            n.z.atan2(-n.x) / TAU + 0.5,
                            n.y.clamp(-1.0, 1.0).asin() / PI + 0.5,
                        ];
                        mesh.push_vertex((n * radius).into(), n.into(), uv)
                    })
                    .collect();
                mesh.push_triangle(ids[0], ids[1], ids[2]);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    #[test]
    fn polyhedron_vertex_counts_follow_detail() {
        for detail in 0..4 {
            let expected = 3 * 20 * (detail as usize + 1).pow(2);
            assert_eq!(icosahedron(1.0, detail).vertex_count(), expected);
            assert_eq!(octahedron(1.0, detail).vertex_count(), 3 * 8 * (detail as usize + 1).pow(2));
        }
    }

    #[test]
    fn polyhedron_vertices_sit_on_the_sphere() {
        let mesh = icosahedron(2.0, 2);
        for v in &mesh.vertices {
            assert!((Vector3::from(v.position).magnitude() - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn segment_counts_never_reduce_vertices() {
        let mut last = [0usize; 4];
        for segments in [8, 12, 24, 32, 48] {
            let counts = [
                sphere(1.0, segments, segments / 2).vertex_count(),
                torus(1.0, 0.3, segments / 2, segments, TAU).vertex_count(),
                torus_knot(1.0, 0.3, segments * 2, segments / 2, 2, 3).vertex_count(),
                cylinder(1.0, 1.0, 1.0, segments).vertex_count(),
            ];
            for (now, before) in counts.iter().zip(last.iter()) {
                assert!(now >= before);
            }
            last = counts;
        }
    }

    #[test]
    fn indices_stay_in_range() {
        let meshes = [
            cuboid(1.0, 2.0, 3.0),
            plane(1.0, 1.0),
            disc(1.0, 16),
            annulus(0.5, 1.0, 16),
            cylinder(0.0, 1.0, 2.0, 12),
            sphere(1.0, 12, 8),
            torus(1.0, 0.2, 8, 24, TAU),
            torus_knot(1.0, 0.2, 64, 8, 2, 3),
            icosahedron(1.0, 1),
        ];
        for mesh in meshes {
            assert!(!mesh.is_empty());
            assert_eq!(mesh.indices.len() % 3, 0);
            assert!(mesh.indices.iter().all(|i| (*i as usize) < mesh.vertex_count()));
        }
    }

    #[test]
    fn cuboid_has_flat_faces() {
        let mesh = cuboid(2.0, 2.0, 2.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert!((mesh.bounding_radius() - 3f32.sqrt()).abs() < 1e-5);
    }
}
