use glam::{Vec2, Vec3};

/// A single counter-clockwise triangle in the xy plane, facing +z.
pub fn triangle(a: Vec2, b: Vec2, c: Vec2) -> (Vec<Vec3>, Vec<u32>) {
	(vec![a.extend(0.), b.extend(0.), c.extend(0.)], vec![0, 1, 2])
}

/// A quad in the xy plane facing +z, spanning `-half_extent..half_extent`.
pub fn quad(half_extent: Vec2) -> (Vec<Vec3>, Vec<u32>) {
	let (x, y) = (half_extent.x, half_extent.y);
	let positions = vec![
		Vec3::new(-x, -y, 0.),
		Vec3::new(x, -y, 0.),
		Vec3::new(x, y, 0.),
		Vec3::new(-x, y, 0.),
	];
	(positions, vec![0, 1, 2, 0, 2, 3])
}

/// A unit cube centered on the origin with outward facing triangles. Faces don't share vertices.
pub fn cube() -> (Vec<Vec3>, Vec<u32>) {
	let mut positions = Vec::with_capacity(24);
	let mut indices = Vec::with_capacity(36);
	for (normal, up) in [
		(Vec3::X, Vec3::Y),
		(Vec3::NEG_X, Vec3::Y),
		(Vec3::Y, Vec3::Z),
		(Vec3::NEG_Y, Vec3::Z),
		(Vec3::Z, Vec3::Y),
		(Vec3::NEG_Z, Vec3::Y),
	] {
		let right = up.cross(normal);
		let base = positions.len() as u32;
		for (r, u) in [(-1., -1.), (1., -1.), (1., 1.), (-1., 1.)] {
			positions.push((normal + right * r + up * u) * 0.5);
		}
		indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
	}
	(positions, indices)
}
