// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides a Quaternion type for representing 3D rotations.

use serde::{Deserialize, Serialize};

use super::{Vec3, EPSILON};
use std::ops::{Mul, MulAssign, Neg};

/// Represents a quaternion for efficient 3D rotations.
///
/// A quaternion is stored as `(x, y, z, w)`, where `[x, y, z]` is the "vector" part
/// and `w` is the "scalar" part. For representing rotations, it should be a "unit
/// quaternion" where `x² + y² + z² + w² = 1`.
///
/// The transform hierarchy treats the quaternion as the source of truth for a
/// rotation; Euler angles are always derived from it with [`Quaternion::to_euler`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quaternion {
    /// The x component of the vector part.
    pub x: f32,
    /// The y component of the vector part.
    pub y: f32,
    /// The z component of the vector part.
    pub z: f32,
    /// The scalar (real) part.
    pub w: f32,
}

impl Quaternion {
    /// The identity quaternion, representing no rotation.
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Creates a new quaternion from its raw components.
    ///
    /// Note: This does not guarantee a unit quaternion. For creating rotations,
    /// prefer using `from_axis_angle` or `from_euler`.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Creates a quaternion representing a rotation around a given axis by a given angle.
    ///
    /// # Arguments
    ///
    /// * `axis`: The axis of rotation. It is normalized before use.
    /// * `angle_radians`: The angle of rotation in radians.
    #[inline]
    pub fn from_axis_angle(axis: Vec3, angle_radians: f32) -> Self {
        let normalized_axis = axis.normalize();
        let half_angle = angle_radians * 0.5;
        let s = half_angle.sin();
        let c = half_angle.cos();
        Self {
            x: normalized_axis.x * s,
            y: normalized_axis.y * s,
            z: normalized_axis.z * s,
            w: c,
        }
    }

    /// Creates a quaternion from Euler angles in radians.
    ///
    /// The angles are applied about the X axis first, then Y, then Z
    /// (`qz * qy * qx`), so `from_euler(e).to_euler()` returns `e` whenever the
    /// pitch `e.y` lies strictly inside `(-PI/2, PI/2)`.
    pub fn from_euler(angles: Vec3) -> Self {
        let (sx, cx) = (angles.x * 0.5).sin_cos();
        let (sy, cy) = (angles.y * 0.5).sin_cos();
        let (sz, cz) = (angles.z * 0.5).sin_cos();
        Self {
            x: sx * cy * cz - cx * sy * sz,
            y: cx * sy * cz + sx * cy * sz,
            z: cx * cy * sz - sx * sy * cz,
            w: cx * cy * cz + sx * sy * sz,
        }
    }

    /// Extracts Euler angles in radians, using the same axis order as [`Quaternion::from_euler`].
    pub fn to_euler(&self) -> Vec3 {
        let q = self.normalize();

        let sin_x_cos_y = 2.0 * (q.w * q.x + q.y * q.z);
        let cos_x_cos_y = 1.0 - 2.0 * (q.x * q.x + q.y * q.y);
        let x = sin_x_cos_y.atan2(cos_x_cos_y);

        // Clamp to avoid NaN from asin when numerical error pushes past +-1.
        let sin_y = (2.0 * (q.w * q.y - q.z * q.x)).clamp(-1.0, 1.0);
        let y = sin_y.asin();

        let sin_z_cos_y = 2.0 * (q.w * q.z + q.x * q.y);
        let cos_z_cos_y = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
        let z = sin_z_cos_y.atan2(cos_z_cos_y);

        Vec3::new(x, y, z)
    }

    /// Calculates the squared length (magnitude) of the quaternion.
    #[inline]
    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Calculates the length (magnitude) of the quaternion.
    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    /// Returns a normalized version of the quaternion with a length of 1.
    /// If the quaternion has a near-zero magnitude, it returns the identity quaternion.
    pub fn normalize(&self) -> Self {
        let mag_sqrt = self.magnitude_squared();
        if mag_sqrt > EPSILON {
            let inv_mag = 1.0 / mag_sqrt.sqrt();
            Self {
                x: self.x * inv_mag,
                y: self.y * inv_mag,
                z: self.z * inv_mag,
                w: self.w * inv_mag,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// Computes the conjugate of the quaternion, which negates the vector part.
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: self.w,
        }
    }

    /// Computes the inverse of the quaternion.
    /// For a unit quaternion, the inverse is equal to its conjugate.
    #[inline]
    pub fn inverse(&self) -> Self {
        let mag_squared = self.magnitude_squared();
        if mag_squared > EPSILON {
            self.conjugate() * (1.0 / mag_squared)
        } else {
            Self::IDENTITY
        }
    }

    /// Computes the dot product of two quaternions.
    #[inline]
    pub fn dot(&self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Returns `true` if both quaternions describe the same rotation within `epsilon`.
    ///
    /// `q` and `-q` encode the same rotation, so the comparison uses the
    /// absolute value of the dot product.
    #[inline]
    pub fn same_rotation(&self, other: Self, epsilon: f32) -> bool {
        (self.normalize().dot(other.normalize()).abs() - 1.0).abs() <= epsilon
    }

    /// Rotates a 3D vector by this quaternion.
    pub fn rotate_vec3(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let s: f32 = self.w;
        2.0 * u.dot(v) * u + (s * s - u.dot(u)) * v + 2.0 * s * u.cross(v)
    }
}

// --- Operator Overloads ---

impl Default for Quaternion {
    /// Returns the identity quaternion, representing no rotation.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Quaternion> for Quaternion {
    type Output = Self;
    /// Combines two rotations using the Hamilton product.
    /// Note that quaternion multiplication is not commutative.
    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }
}

impl MulAssign<Quaternion> for Quaternion {
    /// Combines this rotation with another.
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<Vec3> for Quaternion {
    type Output = Vec3;
    /// Rotates a `Vec3` by this quaternion.
    #[inline]
    fn mul(self, rhs: Vec3) -> Self::Output {
        self.normalize().rotate_vec3(rhs)
    }
}

impl Mul<f32> for Quaternion {
    type Output = Self;
    /// Scales all components of the quaternion by a scalar.
    #[inline]
    fn mul(self, scalar: f32) -> Self::Output {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
            w: self.w * scalar,
        }
    }
}

impl Neg for Quaternion {
    type Output = Self;
    /// Negates all components of the quaternion.
    #[inline]
    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: -self.w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{FRAC_PI_2, FRAC_PI_4};
    use approx::assert_relative_eq;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-4), "{a:?} != {b:?}");
    }

    #[test]
    fn test_identity_and_default() {
        assert_eq!(Quaternion::IDENTITY, Quaternion::default());
        assert_relative_eq!(Quaternion::IDENTITY.magnitude(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_from_axis_angle_rotates_vector() {
        let q = Quaternion::from_axis_angle(Vec3::Y, FRAC_PI_2);
        assert_vec3_eq(q * Vec3::X, -Vec3::Z);

        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 5.0), FRAC_PI_2);
        assert_relative_eq!(q.magnitude(), 1.0, epsilon = EPSILON);
        assert_vec3_eq(q * Vec3::X, Vec3::Y);
    }

    #[test]
    fn test_from_euler_single_axis_matches_axis_angle() {
        let qx = Quaternion::from_euler(Vec3::new(FRAC_PI_4, 0.0, 0.0));
        assert!(qx.same_rotation(Quaternion::from_axis_angle(Vec3::X, FRAC_PI_4), 1e-5));

        let qy = Quaternion::from_euler(Vec3::new(0.0, FRAC_PI_4, 0.0));
        assert!(qy.same_rotation(Quaternion::from_axis_angle(Vec3::Y, FRAC_PI_4), 1e-5));

        let qz = Quaternion::from_euler(Vec3::new(0.0, 0.0, FRAC_PI_4));
        assert!(qz.same_rotation(Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_4), 1e-5));
    }

    #[test]
    fn test_from_euler_composition_order() {
        let angles = Vec3::new(0.3, -0.7, 1.1);
        let expected = Quaternion::from_axis_angle(Vec3::Z, angles.z)
            * Quaternion::from_axis_angle(Vec3::Y, angles.y)
            * Quaternion::from_axis_angle(Vec3::X, angles.x);
        assert!(Quaternion::from_euler(angles).same_rotation(expected, 1e-5));
    }

    #[test]
    fn test_euler_round_trip() {
        let angles = Vec3::new(0.25, 1.2, -2.5);
        let recovered = Quaternion::from_euler(angles).to_euler();
        assert_vec3_eq(recovered, angles);
    }

    #[test]
    fn test_to_euler_clamps_at_gimbal_lock() {
        let q = Quaternion::from_euler(Vec3::new(0.0, FRAC_PI_2, 0.0));
        let euler = q.to_euler();
        assert!(!euler.y.is_nan());
        assert_relative_eq!(euler.y, FRAC_PI_2, epsilon = 1e-3);
    }

    #[test]
    fn test_inverse_cancels_rotation() {
        let q = Quaternion::from_euler(Vec3::new(0.4, 0.1, -0.9));
        assert!((q * q.inverse()).same_rotation(Quaternion::IDENTITY, 1e-5));
        assert!((q.conjugate() * q).same_rotation(Quaternion::IDENTITY, 1e-5));
    }

    #[test]
    fn test_multiplication_is_not_commutative() {
        let a = Quaternion::from_axis_angle(Vec3::X, FRAC_PI_2);
        let b = Quaternion::from_axis_angle(Vec3::Y, FRAC_PI_2);
        assert!(!(a * b).same_rotation(b * a, 1e-3));
    }

    #[test]
    fn test_normalize_degenerate_returns_identity() {
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalize(), Quaternion::IDENTITY);
    }
}
