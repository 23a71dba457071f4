pub mod cone;
pub mod sphere;
