//! Shader descriptor
//!
//! Shader byte code reaches the GAL as opaque blobs produced by an offline
//! compiler. The descriptor only groups the blobs per pipeline stage.

use std::sync::Arc;
use bitflags::bitflags;
use crate::error::{Error, Result};

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
    ];

    pub fn flag(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Hull => ShaderStageFlags::HULL,
            ShaderStage::Domain => ShaderStageFlags::DOMAIN,
            ShaderStage::Geometry => ShaderStageFlags::GEOMETRY,
            ShaderStage::Pixel => ShaderStageFlags::PIXEL,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

bitflags! {
    /// Set of pipeline stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::HULL.bits() | Self::DOMAIN.bits()
            | Self::GEOMETRY.bits() | Self::PIXEL.bits();
    }
}

/// Compiled shader blob (cheap to clone)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderByteCode(Arc<[u8]>);

impl ShaderByteCode {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ShaderByteCode {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for ShaderByteCode {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

/// Descriptor for creating a shader program
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderCreationDescription {
    pub vertex: Option<ShaderByteCode>,
    pub hull: Option<ShaderByteCode>,
    pub domain: Option<ShaderByteCode>,
    pub geometry: Option<ShaderByteCode>,
    pub pixel: Option<ShaderByteCode>,
    pub compute: Option<ShaderByteCode>,
}

impl ShaderCreationDescription {
    /// Byte code of one stage
    pub fn stage(&self, stage: ShaderStage) -> Option<&ShaderByteCode> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_ref(),
            ShaderStage::Hull => self.hull.as_ref(),
            ShaderStage::Domain => self.domain.as_ref(),
            ShaderStage::Geometry => self.geometry.as_ref(),
            ShaderStage::Pixel => self.pixel.as_ref(),
            ShaderStage::Compute => self.compute.as_ref(),
        }
    }

    /// Stages that carry byte code, in pipeline order
    pub fn stages(&self) -> impl Iterator<Item = (ShaderStage, &ShaderByteCode)> {
        ShaderStage::ALL
            .into_iter()
            .filter_map(move |stage| self.stage(stage).map(|code| (stage, code)))
    }

    pub fn stage_flags(&self) -> ShaderStageFlags {
        self.stages().fold(ShaderStageFlags::empty(), |flags, (stage, _)| flags | stage.flag())
    }

    pub fn is_compute(&self) -> bool {
        self.compute.is_some()
    }

    /// Check the stage combination
    pub fn validate(&self) -> Result<()> {
        let flags = self.stage_flags();
        if flags.is_empty() {
            return Err(Error::InvalidResource("shader has no stages".to_string()));
        }
        if let Some((stage, _)) = self.stages().find(|(_, code)| code.is_empty()) {
            return Err(Error::InvalidResource(format!("{:?} byte code is empty", stage)));
        }
        if flags.contains(ShaderStageFlags::COMPUTE) {
            if flags != ShaderStageFlags::COMPUTE {
                return Err(Error::InvalidResource(
                    "compute shaders cannot be combined with graphics stages".to_string(),
                ));
            }
            return Ok(());
        }
        if !flags.contains(ShaderStageFlags::VERTEX) {
            return Err(Error::InvalidResource("graphics shader needs a vertex stage".to_string()));
        }
        if flags.contains(ShaderStageFlags::HULL) != flags.contains(ShaderStageFlags::DOMAIN) {
            return Err(Error::InvalidResource(
                "hull and domain stages must be provided together".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
