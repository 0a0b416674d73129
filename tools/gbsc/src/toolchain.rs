//! Locating the external cross toolchains.
//!
//! Game Boy builds use GBDK (`lcc`), GBA builds use devkitARM from devkitPro.
//! Both are looked up from their conventional environment variables first,
//! then from well-known install locations.

use std::path::{Path, PathBuf};

use gbsc_core::TargetPlatform;

use crate::error::{BuildError, Result};

fn exe(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

#[cfg(windows)]
const DEVKITPRO_ROOTS: &[&str] = &[
    "C:\\devkitPro",
    "D:\\devkitPro",
    "C:\\Utils\\DevKitPro",
    "D:\\Utils\\DevKitPro",
];
#[cfg(not(windows))]
const DEVKITPRO_ROOTS: &[&str] = &["/opt/devkitpro", "/usr/local/devkitpro"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GbdkPaths {
    pub root: PathBuf,
}

impl GbdkPaths {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        GbdkPaths { root: root.into() }
    }

    /// `GBDK_HOME`, then `<tools_dir>/gbdk`.
    pub fn discover(tools_dir: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut searched = Vec::new();
        let candidates = var("GBDK_HOME")
            .map(PathBuf::from)
            .into_iter()
            .chain(std::iter::once(tools_dir.join("gbdk")));
        for root in candidates {
            let paths = GbdkPaths::at(&root);
            if paths.lcc().is_file() {
                return Ok(paths);
            }
            searched.push(root);
        }
        Err(BuildError::ToolchainNotFound {
            toolchain: "GBDK",
            env: "GBDK_HOME",
            searched,
        })
    }

    pub fn bin(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn lcc(&self) -> PathBuf {
        self.bin().join(exe("lcc"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevkitProPaths {
    pub devkitpro: PathBuf,
    pub devkitarm: PathBuf,
}

impl DevkitProPaths {
    pub fn at(devkitpro: impl Into<PathBuf>) -> Self {
        let devkitpro = devkitpro.into();
        DevkitProPaths {
            devkitarm: devkitpro.join("devkitARM"),
            devkitpro,
        }
    }

    /// `DEVKITPRO`/`DEVKITARM`, then the usual install roots.
    pub fn discover(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let roots: Vec<PathBuf> = DEVKITPRO_ROOTS.iter().map(PathBuf::from).collect();
        Self::discover_in(var, &roots)
    }

    pub fn discover_in(var: impl Fn(&str) -> Option<String>, roots: &[PathBuf]) -> Result<Self> {
        let mut searched = Vec::new();
        if let Some(devkitpro) = var("DEVKITPRO") {
            let mut paths = DevkitProPaths::at(devkitpro);
            if let Some(devkitarm) = var("DEVKITARM") {
                paths.devkitarm = PathBuf::from(devkitarm);
            }
            if paths.gcc().is_file() {
                return Ok(paths);
            }
            searched.push(paths.devkitarm);
        }
        for root in roots {
            let paths = DevkitProPaths::at(root);
            if paths.gcc().is_file() {
                return Ok(paths);
            }
            searched.push(root.clone());
        }
        Err(BuildError::ToolchainNotFound {
            toolchain: "devkitPro",
            env: "DEVKITPRO and DEVKITARM",
            searched,
        })
    }

    pub fn bin(&self) -> PathBuf {
        self.devkitarm.join("bin")
    }

    pub fn gcc(&self) -> PathBuf {
        self.bin().join(exe("arm-none-eabi-gcc"))
    }

    pub fn objcopy(&self) -> PathBuf {
        self.bin().join(exe("arm-none-eabi-objcopy"))
    }

    pub fn gbafix(&self) -> PathBuf {
        self.devkitpro.join("tools").join("bin").join(exe("gbafix"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toolchain {
    Gbdk(GbdkPaths),
    DevkitPro(DevkitProPaths),
}

impl Toolchain {
    /// Finds the toolchain for `target` using the process environment.
    pub fn discover(target: TargetPlatform, tools_dir: &Path) -> Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        if target.is_gba() {
            DevkitProPaths::discover(var).map(Toolchain::DevkitPro)
        } else {
            GbdkPaths::discover(tools_dir, var).map(Toolchain::Gbdk)
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        match self {
            Toolchain::Gbdk(gbdk) => gbdk.bin(),
            Toolchain::DevkitPro(dkp) => dkp.bin(),
        }
    }

    /// Driver used for both compiling and linking.
    pub fn compiler(&self) -> PathBuf {
        match self {
            Toolchain::Gbdk(gbdk) => gbdk.lcc(),
            Toolchain::DevkitPro(dkp) => dkp.gcc(),
        }
    }

    /// Install roots exported to the toolchain processes.
    pub fn root_vars(&self) -> Vec<(&'static str, String)> {
        match self {
            Toolchain::Gbdk(gbdk) => vec![(
                "GBDKDIR",
                format!("{}{}", gbdk.root.display(), std::path::MAIN_SEPARATOR),
            )],
            Toolchain::DevkitPro(dkp) => vec![
                ("DEVKITPRO", dkp.devkitpro.display().to_string()),
                ("DEVKITARM", dkp.devkitarm.display().to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn gbdk_home_wins_over_tools_dir() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home-gbdk");
        touch(&GbdkPaths::at(&home).lcc());
        touch(&GbdkPaths::at(dir.path().join("gbdk")).lcc());

        let home_str = home.display().to_string();
        let found = GbdkPaths::discover(dir.path(), |k| {
            (k == "GBDK_HOME").then(|| home_str.clone())
        })
        .unwrap();
        assert_eq!(found.root, home);

        let fallback = GbdkPaths::discover(dir.path(), |_| None).unwrap();
        assert_eq!(fallback.root, dir.path().join("gbdk"));
    }

    #[test]
    fn missing_gbdk_lists_searched_locations() {
        let dir = tempfile::tempdir().unwrap();
        let err = GbdkPaths::discover(dir.path(), |_| None).unwrap_err();
        match err {
            BuildError::ToolchainNotFound { env, searched, .. } => {
                assert_eq!(env, "GBDK_HOME");
                assert_eq!(searched, vec![dir.path().join("gbdk")]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn devkitpro_falls_back_to_install_roots() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("devkitpro");
        touch(&DevkitProPaths::at(&root).gcc());

        let found = DevkitProPaths::discover_in(|_| None, &[dir.path().join("nope"), root.clone()])
            .unwrap();
        assert_eq!(found.devkitpro, root);
        assert_eq!(found.gbafix(), root.join("tools").join("bin").join(exe("gbafix")));
    }

    #[test]
    fn devkitarm_variable_overrides_default_layout() {
        let dir = tempfile::tempdir().unwrap();
        let arm = dir.path().join("arm");
        touch(&arm.join("bin").join(exe("arm-none-eabi-gcc")));

        let dkp = dir.path().display().to_string();
        let arm_str = arm.display().to_string();
        let found = DevkitProPaths::discover_in(
            |k| match k {
                "DEVKITPRO" => Some(dkp.clone()),
                "DEVKITARM" => Some(arm_str.clone()),
                _ => None,
            },
            &[],
        )
        .unwrap();
        assert_eq!(found.devkitarm, arm);
        assert_eq!(found.objcopy(), arm.join("bin").join(exe("arm-none-eabi-objcopy")));
    }
}
