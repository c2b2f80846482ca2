//! Versioned Parameter Store
//!
//! One [`VersionedParameter`] per [`UniformSlot`]. Producers write values
//! at any point in the frame; each write bumps the slot's version. Program
//! instances compare that version against the one they last uploaded to
//! decide whether a slot needs syncing.
//!
//! Values persist across frames. Callers only re-set what changed.
//!
//! | Entry point | Input | Use |
//! |-------------|-------|-----|
//! | [`ParameterStore::set`] | [`UniformValue`] | one typed element |
//! | [`ParameterStore::set_array`] | [`UniformArray`] | several elements of one kind |
//! | [`ParameterStore::set_raw`] | `&[f32]` | untyped boundary writes, dispatched by slot size |

use glam::{Mat3, Mat4};

use crate::errors::{Result, ShaderCacheError};
use crate::key::GlobalShaderType;

use super::uniform_slot::{SlotRegistry, UniformSlot};
use super::uniform_value::{SetterKind, UniformArray, UniformValue};

/// Current value of one slot.
#[derive(Debug, Clone, Default)]
pub struct VersionedParameter {
    /// Bumped on every write. `0` means never written.
    version: u64,
    setter: SetterKind,
    /// Elements of `setter` currently valid in `data`.
    count: usize,
    data: Vec<f32>,
}

impl VersionedParameter {
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn setter(&self) -> SetterKind {
        self.setter
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Floats written by the last setter.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.data[..self.count * self.setter.floats_per_element()]
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.values())
    }
}

/// The single store of engine-side uniform values.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    params: Vec<VersionedParameter>,
    registry: SlotRegistry,
}

impl ParameterStore {
    #[must_use]
    pub fn new(bone_count: u32) -> Self {
        Self {
            params: vec![VersionedParameter::default(); UniformSlot::COUNT],
            registry: SlotRegistry::new(bone_count),
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, slot: UniformSlot) -> &VersionedParameter {
        &self.params[slot.index()]
    }

    #[inline]
    #[must_use]
    pub fn version(&self, slot: UniformSlot) -> u64 {
        self.params[slot.index()].version
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut SlotRegistry {
        &mut self.registry
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    /// Changes the bone count used to size the bone-matrix slot.
    pub fn set_bone_count(&mut self, bone_count: u32) {
        self.registry.set_bone_count(bone_count);
    }

    // ─── Typed writes ───────────────────────────────────────────────────────

    /// Writes one element.
    pub fn set(&mut self, slot: UniformSlot, value: impl Into<UniformValue>) -> Result<()> {
        let value = value.into();
        let kind = value.kind();
        let param = self.prepare(slot, kind, 1)?;
        value.write_to(&mut param.data);
        Ok(())
    }

    /// Writes a run of elements of one kind.
    pub fn set_array(&mut self, slot: UniformSlot, array: UniformArray<'_>) -> Result<()> {
        self.set_flat(slot, array.kind(), array.as_floats())
    }

    /// Writes `floats.len() / width` elements of `kind` from flat storage.
    fn set_flat(&mut self, slot: UniformSlot, kind: SetterKind, floats: &[f32]) -> Result<()> {
        let width = kind.floats_per_element().max(1);
        let count = floats.len() / width;
        let param = self.prepare(slot, kind, count)?;
        param.data[..count * width].copy_from_slice(&floats[..count * width]);
        Ok(())
    }

    /// Checks capacity, bumps the version and records the setter. On error
    /// the slot is left untouched.
    fn prepare(
        &mut self,
        slot: UniformSlot,
        kind: SetterKind,
        count: usize,
    ) -> Result<&mut VersionedParameter> {
        let capacity = self.registry.floats(slot);
        let requested = count * kind.floats_per_element();
        if requested > capacity {
            return Err(ShaderCacheError::ParameterTooLarge {
                slot,
                capacity,
                requested,
            });
        }
        let param = &mut self.params[slot.index()];
        if param.data.len() != capacity {
            param.data.resize(capacity, 0.0);
        }
        param.version += 1;
        param.setter = kind;
        param.count = count;
        Ok(param)
    }

    // ─── Untyped boundary writes ────────────────────────────────────────────

    /// Writes raw floats, choosing the setter from the slot's size.
    ///
    /// `LocalToWorld` also derives `LocalToWorldRotation` and
    /// `LocalToProjection`. Returns the global shader that owns the slot so
    /// the caller can hint the next draw.
    pub fn set_raw(&mut self, slot: UniformSlot, data: &[f32]) -> Result<GlobalShaderType> {
        let floats = self.registry.floats(slot);

        match slot {
            UniformSlot::LocalToWorld => {
                let local_to_world = mat4_from(slot, data)?;
                self.set(slot, local_to_world)?;
                self.set(UniformSlot::LocalToWorldRotation, rotation_only(&local_to_world))?;
                let view_projection = self.view_projection();
                self.set(UniformSlot::LocalToProjection, view_projection * local_to_world)?;
            }
            UniformSlot::BoneMatrices => {
                let bones = self.registry.bone_count() as usize;
                let count = (data.len() / 4).min(bones * 3);
                self.set_flat(slot, SetterKind::Float4, &data[..count * 4])?;
            }
            _ if floats == 16 => {
                self.set(slot, mat4_from(slot, data)?)?;
            }
            _ if floats % 4 != 0 => {
                let values = data
                    .get(..floats)
                    .ok_or(ShaderCacheError::UnsupportedSlotSize {
                        slot,
                        floats: data.len(),
                    })?;
                match floats {
                    1 => self.set(slot, values[0])?,
                    2 => self.set(slot, glam::Vec2::from_slice(values))?,
                    3 => self.set(slot, glam::Vec3::from_slice(values))?,
                    5 => self.set_flat(slot, SetterKind::Float1, values)?,
                    _ => return Err(ShaderCacheError::UnsupportedSlotSize { slot, floats }),
                }
            }
            _ => {
                let count = (floats / 4).min(data.len() / 4);
                self.set_flat(slot, SetterKind::Float4, &data[..count * 4])?;
            }
        }

        Ok(slot.info().owner)
    }

    /// Last written view-projection matrix, or identity.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        let param = self.get(UniformSlot::ViewProjection);
        if param.setter == SetterKind::Mat4 {
            Mat4::from_cols_slice(&param.data[..16])
        } else {
            Mat4::IDENTITY
        }
    }
}

fn mat4_from(slot: UniformSlot, data: &[f32]) -> Result<Mat4> {
    if data.len() < 16 {
        return Err(ShaderCacheError::UnsupportedSlotSize {
            slot,
            floats: data.len(),
        });
    }
    Ok(Mat4::from_cols_slice(&data[..16]))
}

/// Inverse-transpose of the upper 3x3 with scale removed, used to rotate
/// normals without per-vertex renormalization. Singular input yields
/// identity.
fn rotation_only(local_to_world: &Mat4) -> Mat3 {
    let upper = Mat3::from_mat4(*local_to_world);
    if upper.determinant().abs() <= f32::EPSILON {
        return Mat3::IDENTITY;
    }
    let m = upper.inverse().transpose();
    Mat3::from_cols(
        m.x_axis.normalize_or_zero(),
        m.y_axis.normalize_or_zero(),
        m.z_axis.normalize_or_zero(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn test_unwritten_slot_is_version_zero() {
        let store = ParameterStore::new(4);
        assert_eq!(store.version(UniformSlot::FogColor), 0);
        assert_eq!(store.get(UniformSlot::FogColor).setter(), SetterKind::None);
    }

    #[test]
    fn test_every_write_bumps_version() {
        let mut store = ParameterStore::new(4);
        store.set(UniformSlot::FogColor, Vec4::ONE).unwrap();
        store.set(UniformSlot::FogColor, Vec4::ONE).unwrap();
        let param = store.get(UniformSlot::FogColor);
        assert_eq!(param.version(), 2);
        assert_eq!(param.setter(), SetterKind::Float4);
        assert_eq!(param.count(), 1);
        assert_eq!(param.values(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_oversized_write_is_rejected_without_mutation() {
        let mut store = ParameterStore::new(4);
        store.set(UniformSlot::AlphaTestRef, 0.5f32).unwrap();
        let err = store.set(UniformSlot::AlphaTestRef, Vec4::ONE).unwrap_err();
        assert!(matches!(
            err,
            ShaderCacheError::ParameterTooLarge { capacity: 1, requested: 4, .. }
        ));
        assert_eq!(store.version(UniformSlot::AlphaTestRef), 1);
        assert_eq!(store.get(UniformSlot::AlphaTestRef).values(), &[0.5]);
    }

    #[test]
    fn test_raw_local_to_world_derives_companions() {
        let mut store = ParameterStore::new(4);
        let vp = Mat4::from_scale(Vec3::splat(2.0));
        store.set(UniformSlot::ViewProjection, vp).unwrap();

        let ltw = Mat4::from_scale_rotation_translation(
            Vec3::new(3.0, 3.0, 3.0),
            glam::Quat::IDENTITY,
            Vec3::new(1.0, 2.0, 3.0),
        );
        store
            .set_raw(UniformSlot::LocalToWorld, &ltw.to_cols_array())
            .unwrap();

        let rotation = store.get(UniformSlot::LocalToWorldRotation);
        assert_eq!(rotation.setter(), SetterKind::Mat3);
        let rotation = Mat3::from_cols_slice(rotation.values());
        assert!(rotation.abs_diff_eq(Mat3::IDENTITY, 1e-5));

        let ltp = Mat4::from_cols_slice(store.get(UniformSlot::LocalToProjection).values());
        assert!(ltp.abs_diff_eq(vp * ltw, 1e-5));
    }

    #[test]
    fn test_raw_bones_are_clamped_to_bone_count() {
        let mut store = ParameterStore::new(2);
        let data = vec![1.0f32; 4 * 10];
        store.set_raw(UniformSlot::BoneMatrices, &data).unwrap();
        let param = store.get(UniformSlot::BoneMatrices);
        assert_eq!(param.setter(), SetterKind::Float4);
        assert_eq!(param.count(), 6);
    }

    #[test]
    fn test_raw_dispatch_by_size() {
        let mut store = ParameterStore::new(1);
        store.set_raw(UniformSlot::SpecularColor, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(store.get(UniformSlot::SpecularColor).setter(), SetterKind::Float3);

        store.set_raw(UniformSlot::LutWeights, &[0.2; 5]).unwrap();
        let lut = store.get(UniformSlot::LutWeights);
        assert_eq!((lut.setter(), lut.count()), (SetterKind::Float1, 5));

        store.set_raw(UniformSlot::SampleWeights16, &[0.0; 64]).unwrap();
        let weights = store.get(UniformSlot::SampleWeights16);
        assert_eq!((weights.setter(), weights.count()), (SetterKind::Float4, 16));

        let err = store.set_raw(UniformSlot::TextureTransform, &[0.0; 9]).unwrap_err();
        assert!(matches!(err, ShaderCacheError::UnsupportedSlotSize { floats: 9, .. }));
    }

    #[test]
    fn test_raw_returns_owner_hint() {
        let mut store = ParameterStore::new(1);
        let owner = store.set_raw(UniformSlot::SceneMidTones, &[0.0; 4]).unwrap();
        assert_eq!(owner, GlobalShaderType::LUTBlender);
    }
}
