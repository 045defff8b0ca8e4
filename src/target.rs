//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Output format selection and sysroot layout for the ents compiler
//

use crate::diag::{CompileError, CompileResult};
use std::path::{Path, PathBuf};

// ============================================================================
// Output Format
// ============================================================================

/// Output container format requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Elf,
    Obj,
    Bin,
}

impl OutputFormat {
    /// Parse a `-f` argument. Unknown names are a fatal error at the caller.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "elf" => Some(OutputFormat::Elf),
            "obj" => Some(OutputFormat::Obj),
            "bin" => Some(OutputFormat::Bin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Elf => "elf",
            OutputFormat::Obj => "obj",
            OutputFormat::Bin => "bin",
        }
    }

    /// The nasm `-f` argument used when assembling this format
    pub fn nasm_format(&self) -> &'static str {
        match self {
            OutputFormat::Elf | OutputFormat::Obj => "elf64",
            OutputFormat::Bin => "bin",
        }
    }
}

// ============================================================================
// Sysroot
// ============================================================================

/// Filesystem layout the compiler expects around itself.
///
/// `SYSROOT` is fixed at build time (defaults to `/usr`) and defines the
/// built-in include root and the runtime library directory. The runtime
/// files are checked once at startup; compilation never starts without them.
#[derive(Debug, Clone)]
pub struct Sysroot {
    root: PathBuf,
}

/// Runtime files required in `SYSROOT/lib/ents`
const REQUIRED_LIB_FILES: [&str; 2] = ["crt0.o", "intlibe.a"];

impl Sysroot {
    /// Sysroot from the build-time `SYSROOT` path
    pub fn from_build_env() -> Self {
        let root = option_env!("SYSROOT").unwrap_or("/usr");
        Self {
            root: PathBuf::from(root),
        }
    }

    #[cfg(test)]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Built-in include search root (`SYSROOT/include/ents`)
    pub fn include_root(&self) -> PathBuf {
        self.root.join("include").join("ents")
    }

    /// Runtime library directory (`SYSROOT/lib/ents`)
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib").join("ents")
    }

    pub fn crt0(&self) -> PathBuf {
        self.lib_dir().join("crt0.o")
    }

    pub fn intlibe(&self) -> PathBuf {
        self.lib_dir().join("intlibe.a")
    }

    /// Verify the runtime files exist. Missing files are fatal.
    pub fn check(&self) -> CompileResult<()> {
        for file in REQUIRED_LIB_FILES {
            let path = self.lib_dir().join(file);
            if !Path::new(&path).exists() {
                return Err(CompileError::io(format!(
                    "missing runtime file: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_name("elf"), Some(OutputFormat::Elf));
        assert_eq!(OutputFormat::from_name("obj"), Some(OutputFormat::Obj));
        assert_eq!(OutputFormat::from_name("bin"), Some(OutputFormat::Bin));
        assert_eq!(OutputFormat::from_name("coff"), None);
    }

    #[test]
    fn test_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Elf);
        assert_eq!(OutputFormat::default().as_str(), "elf");
    }

    #[test]
    fn test_sysroot_layout() {
        let sysroot = Sysroot::at("/opt/ents");
        assert_eq!(
            sysroot.include_root(),
            PathBuf::from("/opt/ents/include/ents")
        );
        assert_eq!(sysroot.lib_dir(), PathBuf::from("/opt/ents/lib/ents"));
        assert_eq!(sysroot.crt0(), PathBuf::from("/opt/ents/lib/ents/crt0.o"));
    }

    #[test]
    fn test_sysroot_check_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sysroot = Sysroot::at(dir.path());
        assert!(sysroot.check().is_err());
    }

    #[test]
    fn test_sysroot_check_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lib = dir.path().join("lib").join("ents");
        std::fs::create_dir_all(&lib).expect("mkdir");
        std::fs::write(lib.join("crt0.o"), b"").expect("write");
        std::fs::write(lib.join("intlibe.a"), b"").expect("write");
        let sysroot = Sysroot::at(dir.path());
        assert!(sysroot.check().is_ok());
    }
}
