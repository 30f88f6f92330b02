//! Package manager table used by `install_dependencies`.
//!
//! Every supported manager and the exact install invocation it gets is
//! defined here, so an unknown manager name is rejected before anything is
//! spawned.

use tokio::process::Command;

/// A package manager the agent can install dependencies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkgManager {
    Npm,
    Yarn,
    Pip,
    Pipenv,
    Composer,
}

impl PkgManager {
    pub const ALL: [PkgManager; 5] = [
        PkgManager::Npm,
        PkgManager::Yarn,
        PkgManager::Pip,
        PkgManager::Pipenv,
        PkgManager::Composer,
    ];

    /// Parse a manager name as given by the model (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|pm| pm.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PkgManager::Npm => "npm",
            PkgManager::Yarn => "yarn",
            PkgManager::Pip => "pip",
            PkgManager::Pipenv => "pipenv",
            PkgManager::Composer => "composer",
        }
    }

    /// The binary that performs the install.
    pub fn bin(&self) -> &'static str {
        self.name()
    }

    /// Returns the arguments for installing `packages`, e.g. `["add", "react"]` for yarn.
    pub fn install_args(&self, packages: &[&str]) -> Vec<String> {
        let verb = match self {
            PkgManager::Npm | PkgManager::Pip | PkgManager::Pipenv => "install",
            PkgManager::Yarn => "add",
            PkgManager::Composer => "require",
        };
        std::iter::once(verb)
            .chain(packages.iter().copied())
            .map(str::to_string)
            .collect()
    }

    /// Full shell command line for installing a whitespace-separated package list.
    pub fn install_command(&self, packages: &str) -> String {
        let packages: Vec<&str> = packages.split_whitespace().collect();
        std::iter::once(self.bin().to_string())
            .chain(self.install_args(&packages))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Comma-separated list of supported manager names, for error messages.
pub fn supported_names() -> String {
    PkgManager::ALL
        .iter()
        .map(|pm| pm.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Detect whether the manager's binary is available on the host.
pub async fn is_available(pm: PkgManager) -> bool {
    Command::new(pm.bin())
        .arg("--version")
        .output()
        .await
        .is_ok_and(|o| o.status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yarn_install_args() {
        let pm = PkgManager::Yarn;
        assert_eq!(pm.install_args(&["react", "react-dom"]), vec!["add", "react", "react-dom"]);
    }

    #[test]
    fn composer_install_command() {
        let pm = PkgManager::Composer;
        assert_eq!(
            pm.install_command("monolog/monolog  guzzlehttp/guzzle"),
            "composer require monolog/monolog guzzlehttp/guzzle"
        );
    }

    #[test]
    fn pip_install_command() {
        assert_eq!(PkgManager::Pip.install_command("flask"), "pip install flask");
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(PkgManager::from_name(" NPM "), Some(PkgManager::Npm));
        assert_eq!(PkgManager::from_name("pipenv"), Some(PkgManager::Pipenv));
        assert_eq!(PkgManager::from_name("bogus"), None);
    }

    #[test]
    fn supported_names_lists_every_manager() {
        assert_eq!(supported_names(), "npm, yarn, pip, pipenv, composer");
    }
}
