// src/geometry.rs - Vector helpers and the basis-to-quaternion builder
use nalgebra::{Matrix4, Rotation3, UnitQuaternion, Vector3};

use crate::landmarks::Landmark;

/// Direction from `a` to `b`.
pub fn vector_between<S>(a: &Landmark<S>, b: &Landmark<S>) -> Vector3<f64> {
    b.coords() - a.coords()
}

/// Scales `v` to unit length.
///
/// A zero vector has no direction and comes back as `(NaN, NaN, NaN)`;
/// callers check the finished transform with [`is_finite`] rather than
/// guarding every division.
pub fn normalize(v: &Vector3<f64>) -> Vector3<f64> {
    let length = v.norm();
    v / length
}

pub fn negate(v: &Vector3<f64>) -> Vector3<f64> {
    -v
}

pub fn cross_product(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    a.cross(b)
}

pub fn calculate_distance<S>(p: &Landmark<S>, q: &Landmark<S>) -> f64 {
    vector_between(p, q).norm()
}

/// Angle of the `p -> q` segment in the image plane, radians. z is ignored.
pub fn calculate_orientation<S>(p: &Landmark<S>, q: &Landmark<S>) -> f64 {
    let dx = q.x - p.x;
    let dy = q.y - p.y;
    dy.atan2(dx)
}

pub fn is_finite(v: &Vector3<f64>) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Builds the rotation whose local x/y/z axes map onto `right`, `up` and
/// `forward`.
///
/// The vectors become the columns of a homogeneous matrix with no
/// translation, and the quaternion is read off its rotation block. They are
/// used as given: no re-orthogonalisation is applied, so a skewed basis gives
/// an unreliable quaternion.
pub fn orientation_from_basis(
    right: &Vector3<f64>,
    up: &Vector3<f64>,
    forward: &Vector3<f64>,
) -> UnitQuaternion<f64> {
    #[rustfmt::skip]
    let basis = Matrix4::new(
        right.x, up.x, forward.x, 0.0,
        right.y, up.y, forward.y, 0.0,
        right.z, up.z, forward.z, 0.0,
        0.0,     0.0,  0.0,       1.0,
    );

    let rotation = Rotation3::from_matrix_unchecked(basis.fixed_view::<3, 3>(0, 0).into_owned());
    UnitQuaternion::from_rotation_matrix(&rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Normalized, World};

    const EPS: f64 = 1e-9;

    fn lm(x: f64, y: f64, z: f64) -> Landmark<World> {
        Landmark::new(x, y, z)
    }

    fn assert_vec_eq(actual: Vector3<f64>, expected: Vector3<f64>) {
        assert!(
            (actual - expected).norm() < EPS,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn normalize_gives_unit_length() {
        let samples = [
            Vector3::new(3.0, 4.0, 0.0),
            Vector3::new(-0.001, 0.002, 0.0005),
            Vector3::new(120.0, -7.5, 33.0),
            Vector3::new(0.0, 0.0, -2.0),
        ];
        for v in samples {
            let n = normalize(&v);
            assert!((n.norm() - 1.0).abs() < EPS, "|{:?}| = {}", n, n.norm());
        }
    }

    #[test]
    fn normalize_zero_vector_is_nan() {
        let n = normalize(&Vector3::zeros());
        assert!(n.x.is_nan() && n.y.is_nan() && n.z.is_nan());
        assert!(!is_finite(&n));
    }

    #[test]
    fn cross_product_is_anticommutative_and_orthogonal() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(-4.0, 0.5, 2.0);

        let ab = cross_product(&a, &b);
        let ba = cross_product(&b, &a);

        assert_vec_eq(ab, negate(&ba));
        assert!(ab.dot(&a).abs() < EPS);
        assert!(ab.dot(&b).abs() < EPS);
    }

    #[test]
    fn vector_between_reverses_sign() {
        let a = lm(0.2, -1.0, 4.0);
        let b = lm(1.5, 3.0, -2.0);
        assert_vec_eq(vector_between(&a, &b), -vector_between(&b, &a));
        assert_vec_eq(vector_between(&a, &b), Vector3::new(1.3, 4.0, -6.0));
    }

    #[test]
    fn distance_is_symmetric_and_zero_only_for_equal_points() {
        let p: Landmark<Normalized> = Landmark::new(0.1, 0.2, 0.3);
        let q: Landmark<Normalized> = Landmark::new(0.4, 0.6, 0.3);

        assert_eq!(calculate_distance(&p, &q), calculate_distance(&q, &p));
        assert!((calculate_distance(&p, &q) - 0.5).abs() < EPS);
        assert_eq!(calculate_distance(&p, &p), 0.0);
        assert!(calculate_distance(&p, &q) > 0.0);
    }

    #[test]
    fn orientation_ignores_depth() {
        let p: Landmark<Normalized> = Landmark::new(0.0, 0.0, 5.0);
        let q: Landmark<Normalized> = Landmark::new(0.0, 1.0, -3.0);
        assert!((calculate_orientation(&p, &q) - std::f64::consts::FRAC_PI_2).abs() < EPS);

        let r: Landmark<Normalized> = Landmark::new(-1.0, 0.0, 0.0);
        assert!((calculate_orientation(&p, &r) - std::f64::consts::PI).abs() < EPS);
    }

    #[test]
    fn basis_quaternion_maps_axes_onto_columns() {
        let right = Vector3::new(0.0, 0.0, 1.0);
        let up = Vector3::new(0.0, 1.0, 0.0);
        let forward = Vector3::new(-1.0, 0.0, 0.0);

        let q = orientation_from_basis(&right, &up, &forward);

        assert!((q.quaternion().norm() - 1.0).abs() < EPS);
        assert_vec_eq(q * Vector3::x(), right);
        assert_vec_eq(q * Vector3::y(), up);
        assert_vec_eq(q * Vector3::z(), forward);

        // No translation survives into the homogeneous form
        let h = q.to_homogeneous();
        assert_eq!(h[(0, 3)], 0.0);
        assert_eq!(h[(1, 3)], 0.0);
        assert_eq!(h[(2, 3)], 0.0);
        assert_eq!(h[(3, 3)], 1.0);
    }

    #[test]
    fn identity_basis_gives_identity_rotation() {
        let q = orientation_from_basis(&Vector3::x(), &Vector3::y(), &Vector3::z());
        assert!(q.angle() < EPS);
    }
}
