//! Channel remap descriptors.
//!
//! The native wire format encodes per-channel selectors as signed 1-based
//! integers: `0` fills the channel with zeros, [`REMAP_ONES`] fills it with
//! ones, positive `k` selects source index `k - 1` verbatim and negative `k`
//! selects it inverted (`1 - x`). That encoding is normalized into
//! [`ChannelSelect`] at the boundary so the pack loops never reason about
//! signs or off-by-one offsets.

use crate::errors::{ConvertError, Result};
use crate::scene::texture::TextureInstance;

/// Wire sentinel for a constant-one channel.
pub const REMAP_ONES: i32 = i32::MAX;
/// Wire value for a constant-zero channel.
pub const REMAP_ZEROS: i32 = 0;

/// Per-output-channel source selector.
///
/// `Map::index` is 0-based. Its meaning depends on the descriptor shape:
/// with a single contributing texture it selects a channel of the sampled
/// RGBA value, with several contributors it selects which texture feeds the
/// channel (that texture's first channel is taken).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSelect {
    Zero,
    One,
    Map { index: usize, invert: bool },
}

impl ChannelSelect {
    /// Decode one signed wire selector.
    pub fn from_signed(sel: i32) -> Self {
        match sel {
            REMAP_ZEROS => ChannelSelect::Zero,
            REMAP_ONES => ChannelSelect::One,
            k if k > 0 => ChannelSelect::Map { index: (k - 1) as usize, invert: false },
            k => ChannelSelect::Map { index: (-k - 1) as usize, invert: true },
        }
    }

    /// Re-encode to the signed wire form, used for cache keys and the
    /// native writer.
    pub fn to_signed(self) -> i32 {
        match self {
            ChannelSelect::Zero => REMAP_ZEROS,
            ChannelSelect::One => REMAP_ONES,
            ChannelSelect::Map { index, invert: false } => index as i32 + 1,
            ChannelSelect::Map { index, invert: true } => -(index as i32 + 1),
        }
    }
}

/// A channel remap descriptor plus its ordered contributing textures.
///
/// The descriptor's length is the packed output's channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRemap {
    pub channels: Vec<ChannelSelect>,
    pub textures: Vec<TextureInstance>,
}

impl ChannelRemap {
    pub fn new(channels: Vec<ChannelSelect>, textures: Vec<TextureInstance>) -> Self {
        Self { channels, textures }
    }

    /// Build from signed wire selectors, validating bounds.
    pub fn from_signed(selectors: &[i32], textures: Vec<TextureInstance>) -> Result<Self> {
        let remap = Self {
            channels: selectors.iter().copied().map(ChannelSelect::from_signed).collect(),
            textures,
        };
        remap.validate()?;
        Ok(remap)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// A single contributor means selectors address channels of its sampled
    /// value; several mean selectors address the contributor list itself.
    pub fn is_single_contributor(&self) -> bool {
        self.textures.len() == 1
    }

    /// Bounds-check every non-constant selector against the space it
    /// addresses (RGBA channels for one contributor, the contributor list
    /// otherwise).
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() || self.channels.len() > 4 {
            return Err(ConvertError::MalformedInput(format!(
                "remap descriptor has {} channels, expected 1..=4",
                self.channels.len()
            )));
        }
        let bound = if self.is_single_contributor() { 4 } else { self.textures.len() };
        for (c, sel) in self.channels.iter().enumerate() {
            if let ChannelSelect::Map { index, .. } = sel {
                if *index >= bound {
                    return Err(ConvertError::MalformedInput(format!(
                        "remap channel {c} selects source {index} out of {bound}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Content-address for the pack cache: selectors, contributing texture
    /// ids, and the shared gamma of the first contributor.
    pub fn cache_key(&self) -> PackKey {
        PackKey {
            selectors: self.channels.iter().map(|s| s.to_signed()).collect(),
            texture_ids: self.textures.iter().map(|t| t.texture).collect(),
            gamma_bits: self
                .textures
                .first()
                .map_or(0, |t| t.input_gamma.to_bits()),
        }
    }
}

/// Hashable identity of one packed image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackKey {
    selectors: Vec<i32>,
    texture_ids: Vec<u32>,
    gamma_bits: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_round_trip() {
        for sel in [REMAP_ZEROS, REMAP_ONES, 1, 3, -1, -4] {
            assert_eq!(ChannelSelect::from_signed(sel).to_signed(), sel);
        }
        assert_eq!(
            ChannelSelect::from_signed(-2),
            ChannelSelect::Map { index: 1, invert: true }
        );
    }

    #[test]
    fn validate_rejects_out_of_bounds_selector() {
        let inst = TextureInstance::new(0);
        // two contributors, selector addresses a third
        let remap = ChannelRemap::from_signed(&[1, 3], vec![inst.clone(), inst]);
        assert!(remap.is_err());
    }

    #[test]
    fn cache_key_ignores_sampler_but_not_gamma() {
        let a = TextureInstance::new(7);
        let mut b = a.clone();
        b.input_gamma = 1.0;
        let r1 = ChannelRemap::new(vec![ChannelSelect::Zero, ChannelSelect::One], vec![a]);
        let r2 = ChannelRemap::new(vec![ChannelSelect::Zero, ChannelSelect::One], vec![b]);
        assert_ne!(r1.cache_key(), r2.cache_key());
        assert_eq!(r1.cache_key(), r1.clone().cache_key());
    }
}
