//! Resource Roles
//!
//! Passes never reference concrete textures. They reference a *role* drawn
//! from the closed [`ResourceType`] vocabulary, resolved every frame:
//!
//! | Role group | Resolved against |
//! |------------|------------------|
//! | Guides, noisy inputs, outputs | [`UserPool`] supplied by the host |
//! | `PermanentPool` | Instance permanent pool slot (ping-pong aware) |
//! | `TransientPool` | Instance transient pool slot |

/// Logical roles a pass may bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ResourceType {
    // ---- Common guides ----
    InMv,
    InNormalRoughness,
    InViewZ,

    // ---- Noisy inputs ----
    InDiffRadianceHitDist,
    InSpecRadianceHitDist,
    InShadowData,
    InShadowTranslucency,
    InRadiance,

    // ---- Outputs ----
    OutDiffRadianceHitDist,
    OutSpecRadianceHitDist,
    OutShadowTranslucency,
    OutRadiance,
    OutReflectionMv,

    // ---- Pool markers ----
    TransientPool,
    PermanentPool,
}

impl ResourceType {
    /// Number of roles the host can bind (everything except pool markers).
    pub const USER_COUNT: usize = Self::TransientPool as usize;

    /// Every host-bindable role, in declaration order.
    pub const USER_ROLES: [Self; Self::USER_COUNT] = [
        Self::InMv,
        Self::InNormalRoughness,
        Self::InViewZ,
        Self::InDiffRadianceHitDist,
        Self::InSpecRadianceHitDist,
        Self::InShadowData,
        Self::InShadowTranslucency,
        Self::InRadiance,
        Self::OutDiffRadianceHitDist,
        Self::OutSpecRadianceHitDist,
        Self::OutShadowTranslucency,
        Self::OutRadiance,
        Self::OutReflectionMv,
    ];

    #[inline]
    #[must_use]
    pub const fn is_pool(self) -> bool {
        matches!(self, Self::TransientPool | Self::PermanentPool)
    }
}

/// How a pass accesses a bound texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DescriptorType {
    /// Read-only sampled texture (SRV).
    Texture,
    /// Read-write storage texture (UAV).
    StorageTexture,
}

/// One role reference inside a compiled pass.
///
/// For pooled roles `index_in_pool` is the pool slot used on even method
/// frames and `odd_frame_index_in_pool` the one used on odd frames; both are
/// equal unless the texture is one half of a ping-pong pair. Before the pool
/// allocator runs the indices are method-local, afterwards they are global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub ty: ResourceType,
    pub index_in_pool: u16,
    pub odd_frame_index_in_pool: u16,
    pub mip_offset: u16,
    pub mip_num: u16,
    pub descriptor_type: DescriptorType,
}

impl ResourceRef {
    /// Pool slot to bind for a method frame of the given parity.
    #[inline]
    #[must_use]
    pub fn pool_index(&self, odd_frame: bool) -> u16 {
        if odd_frame {
            self.odd_frame_index_in_pool
        } else {
            self.index_in_pool
        }
    }
}

/// Opaque handle of a host-owned texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalTexture(pub u64);

/// Host-supplied textures keyed by role.
///
/// Only roles actually referenced by the registered methods must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPool {
    entries: [Option<ExternalTexture>; ResourceType::USER_COUNT],
}

impl UserPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `texture` to `ty`. Pool markers cannot be bound and are ignored.
    pub fn set(&mut self, ty: ResourceType, texture: ExternalTexture) -> &mut Self {
        if ty.is_pool() {
            log::warn!("UserPool: {ty:?} is a pool marker and cannot be bound");
        } else {
            self.entries[ty as usize] = Some(texture);
        }
        self
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, ty: ResourceType, texture: ExternalTexture) -> Self {
        self.set(ty, texture);
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, ty: ResourceType) -> Option<ExternalTexture> {
        if ty.is_pool() {
            None
        } else {
            self.entries[ty as usize]
        }
    }

    pub fn clear(&mut self) {
        self.entries = [None; ResourceType::USER_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_roles_cover_every_non_pool_type() {
        for (i, ty) in ResourceType::USER_ROLES.iter().enumerate() {
            assert_eq!(*ty as usize, i);
            assert!(!ty.is_pool());
        }
    }

    #[test]
    fn pool_markers_are_never_bound() {
        let pool = UserPool::new().with(ResourceType::PermanentPool, ExternalTexture(7));
        assert_eq!(pool.get(ResourceType::PermanentPool), None);
    }
}
