//! Shader loading for the Quadra renderer.
//!
//! GLSL sources live in the workspace `shaders/` directory. The build script
//! compiles them with shaderc into `shaders/output/`, which the renderer reads
//! at startup.

use std::path::{Path, PathBuf};

use quadra_core::constants::{FRAGMENT_SHADER_PATH, VERTEX_SHADER_PATH};
use thiserror::Error;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("Failed to read shader {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Shader {path} is {len} bytes, not a multiple of 4")]
    Misaligned { path: PathBuf, len: usize },
    #[error("Shader {path} is not SPIR-V (magic {found:#010x})")]
    BadMagic { path: PathBuf, found: u32 },
}

pub type Result<T> = std::result::Result<T, ShaderError>;

/// Locations of the compiled vertex and fragment shaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    /// Compiled vertex stage.
    pub vertex: PathBuf,
    /// Compiled fragment stage.
    pub fragment: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from(VERTEX_SHADER_PATH),
            fragment: PathBuf::from(FRAGMENT_SHADER_PATH),
        }
    }
}

impl ShaderPaths {
    /// Load both stages.
    pub fn load(&self) -> Result<ShaderPair> {
        Ok(ShaderPair {
            vertex: load_spirv(&self.vertex)?,
            fragment: load_spirv(&self.fragment)?,
        })
    }
}

/// SPIR-V words for the two pipeline stages.
#[derive(Debug, Clone)]
pub struct ShaderPair {
    /// Vertex stage bytecode.
    pub vertex: Vec<u32>,
    /// Fragment stage bytecode.
    pub fragment: Vec<u32>,
}

/// Convert byte slice to aligned u32 words (SPIR-V requires 4-byte alignment).
fn bytes_to_spirv(path: &Path, bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(ShaderError::Misaligned {
            path: path.to_path_buf(),
            len: bytes.len(),
        });
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&found) => Err(ShaderError::BadMagic {
            path: path.to_path_buf(),
            found,
        }),
        None => Err(ShaderError::Misaligned {
            path: path.to_path_buf(),
            len: 0,
        }),
    }
}

/// Read a compiled SPIR-V module from disk.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let words = bytes_to_spirv(path, &bytes)?;
    tracing::debug!("Loaded shader {} ({} words)", path.display(), words.len());
    Ok(words)
}
