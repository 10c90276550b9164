//! First-boot script for runner instances
//!
//! The script is passed to the instance as user data and runs as root on first boot:
//! - installs Docker with apt-get or yum when it is missing
//! - downloads and unpacks the GitHub Actions runner for the instance architecture
//! - registers the runner in ephemeral mode with the generated label
//! - runs the agent in the foreground

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::label::RunnerLabel;
use crate::registration::RegistrationToken;

/// Runner release installed when no version is configured
pub const DEFAULT_RUNNER_VERSION: &str = "2.321.0";

/// Label every runner started by this tool carries next to its generated label
pub const DEFAULT_EXTRA_LABEL: &str = "huaweicloud";

/// Directory the runner is unpacked into on the instance
pub const RUNNER_DIR: &str = "/opt/actions-runner";

/// CPU architecture of the runner release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X64,
    Arm64,
}

impl Arch {
    /// Architecture string used in runner release asset names
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Parse `uname -m` style output. Returns `None` for anything unrecognized.
    pub fn from_uname(uname: &str) -> Option<Self> {
        match uname.trim() {
            "x86_64" | "amd64" | "x64" => Some(Arch::X64),
            "aarch64" | "arm64" => Some(Arch::Arm64),
            _ => None,
        }
    }
}

/// Instance-side knobs for the runner installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerHints {
    /// Runner release, without the leading `v`
    pub version: String,
    /// Architecture as reported by `uname -m`. Unset or unrecognized values are detected on
    /// the instance at boot.
    pub architecture: Option<String>,
    /// Labels registered in addition to the generated one
    pub extra_labels: Vec<String>,
}

impl Default for RunnerHints {
    fn default() -> Self {
        Self {
            version: DEFAULT_RUNNER_VERSION.to_string(),
            architecture: None,
            extra_labels: vec![DEFAULT_EXTRA_LABEL.to_string()],
        }
    }
}

/// Rendered first-boot script
#[derive(Clone)]
pub struct BootstrapScript {
    text: String,
}

impl BootstrapScript {
    /// Render the script. The token is consumed: it is valid for one registration only.
    pub fn render(
        label: &RunnerLabel,
        token: RegistrationToken,
        registration_url: &str,
        hints: &RunnerHints,
    ) -> Self {
        let mut text = String::from("#!/bin/bash\n");
        text.push_str(DOCKER_INSTALL);
        text.push_str(&format!(
            "\nmkdir -p /root\nexport HOME=/root\n\nmkdir -p {dir} && cd {dir}\n",
            dir = RUNNER_DIR
        ));
        text.push_str(&runner_download(hints));
        text.push_str("export RUNNER_ALLOW_RUNASROOT=1\n");
        text.push_str("export DOTNET_SYSTEM_GLOBALIZATION_INVARIANT=1\n");
        text.push_str(&config_invocation(
            label,
            &token.into_secret(),
            registration_url,
            &hints.extra_labels,
        ));
        text.push_str("exec ./run.sh\n");

        Self { text }
    }

    /// Plain script text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Base64 form, safe to embed as instance user data
    pub fn encoded(&self) -> String {
        BASE64.encode(self.text.as_bytes())
    }
}

impl std::fmt::Debug for BootstrapScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The script embeds the registration token
        f.debug_struct("BootstrapScript")
            .field("len", &self.text.len())
            .finish()
    }
}

const DOCKER_INSTALL: &str = r#"if ! [ -x "$(command -v docker)" ]; then
    if [ -x "$(command -v apt-get)" ]; then
        apt-get update
        apt-get install -y ca-certificates curl gnupg lsb-release
        mkdir -p /usr/share/keyrings
        curl -fsSL https://download.docker.com/linux/ubuntu/gpg | gpg --dearmor --yes -o /usr/share/keyrings/docker-archive-keyring.gpg
        echo "deb [arch=$(dpkg --print-architecture) signed-by=/usr/share/keyrings/docker-archive-keyring.gpg] https://download.docker.com/linux/ubuntu $(lsb_release -cs) stable" > /etc/apt/sources.list.d/docker.list
        apt-get update
        apt-get install -y docker-ce docker-ce-cli containerd.io
    elif [ -x "$(command -v yum)" ]; then
        yum install -y yum-utils
        yum-config-manager --add-repo https://download.docker.com/linux/centos/docker-ce.repo
        yum install -y docker-ce docker-ce-cli containerd.io
    fi
    if [ -x "$(command -v systemctl)" ]; then
        systemctl enable --now docker
    fi
fi
"#;

/// Download and unpack step. A recognized architecture hint pins the asset; otherwise the
/// instance picks it from `uname -m` and falls back to x64.
fn runner_download(hints: &RunnerHints) -> String {
    let version = &hints.version;
    match hints.architecture.as_deref().and_then(Arch::from_uname) {
        Some(arch) => unpack_block(
            &format!("actions-runner-linux-{}-{}.tar.gz", arch.as_str(), version),
            version,
        ),
        None => format!(
            "case \"$(uname -m)\" in\n    aarch64|arm64) RUNNER_ARCH=arm64 ;;\n    *) RUNNER_ARCH=x64 ;;\nesac\n{}",
            unpack_block(
                &format!("actions-runner-linux-$RUNNER_ARCH-{}.tar.gz", version),
                version
            )
        ),
    }
}

fn unpack_block(archive: &str, version: &str) -> String {
    format!(
        "RUNNER_ARCHIVE=\"{archive}\"\n\
         if ! [ -x ./config.sh ]; then\n    \
         curl -fsSL -o \"$RUNNER_ARCHIVE\" \"https://github.com/actions/runner/releases/download/v{version}/$RUNNER_ARCHIVE\"\n    \
         tar xzf \"./$RUNNER_ARCHIVE\"\n    \
         rm -f \"./$RUNNER_ARCHIVE\"\n\
         fi\n",
    )
}

fn config_invocation(
    label: &RunnerLabel,
    token: &str,
    registration_url: &str,
    extra_labels: &[String],
) -> String {
    let labels = std::iter::once(label.as_str())
        .chain(extra_labels.iter().map(String::as_str).filter(|l| !l.is_empty()))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "./config.sh --unattended --ephemeral --url {} --token {} --labels {}\n",
        shell_quote(registration_url),
        shell_quote(token),
        shell_quote(&labels),
    )
}

/// Single-quote a value for a POSIX shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "AABBCCDDEEFFGGHHIIJJKKLLMMNN";

    fn render(arch: Option<&str>) -> (RunnerLabel, BootstrapScript) {
        let label = RunnerLabel::new("actions-ab12cd34");
        let hints = RunnerHints {
            architecture: arch.map(str::to_string),
            ..RunnerHints::default()
        };
        let script = BootstrapScript::render(
            &label,
            RegistrationToken::new(TOKEN, None),
            "https://github.com/acme/widgets",
            &hints,
        );
        (label, script)
    }

    fn config_line(script: &str) -> &str {
        script
            .lines()
            .find(|l| l.starts_with("./config.sh"))
            .expect("config invocation present")
    }

    #[test]
    fn test_aarch64_selects_arm64_asset() {
        let (_, script) = render(Some("aarch64"));
        assert!(script
            .as_str()
            .contains("actions-runner-linux-arm64-2.321.0.tar.gz"));
        assert!(!script.as_str().contains("actions-runner-linux-x64"));
    }

    #[test]
    fn test_x86_64_selects_x64_asset() {
        let (_, script) = render(Some("x86_64"));
        assert!(script
            .as_str()
            .contains("actions-runner-linux-x64-2.321.0.tar.gz"));
        assert!(!script.as_str().contains("actions-runner-linux-arm64"));
    }

    #[test]
    fn test_unknown_arch_is_detected_on_instance() {
        for arch in [None, Some("riscv64")] {
            let (_, script) = render(arch);
            let text = script.as_str();
            assert!(text.contains("case \"$(uname -m)\" in"));
            assert!(text.contains("*) RUNNER_ARCH=x64 ;;"));
            assert!(text.contains("actions-runner-linux-$RUNNER_ARCH-2.321.0.tar.gz"));
        }
    }

    #[test]
    fn test_label_and_token_appear_once_on_config_line() {
        let (label, script) = render(Some("x86_64"));
        let decoded = String::from_utf8(BASE64.decode(script.encoded()).unwrap()).unwrap();
        let line = config_line(&decoded);

        assert_eq!(line.matches(TOKEN).count(), 1);
        assert_eq!(line.matches(label.as_str()).count(), 1);
        // The token is never echoed anywhere else in the script
        assert_eq!(decoded.matches(TOKEN).count(), 1);
    }

    #[test]
    fn test_config_line_flags() {
        let (_, script) = render(None);
        let line = config_line(script.as_str());

        assert!(line.contains("--unattended"));
        assert!(line.contains("--ephemeral"));
        assert!(line.contains("--url 'https://github.com/acme/widgets'"));
        assert!(line.contains("--labels 'actions-ab12cd34,huaweicloud'"));
    }

    #[test]
    fn test_steps_are_ordered() {
        let (_, script) = render(None);
        let text = script.as_str();

        let docker = text.find("command -v docker").unwrap();
        let download = text.find("curl -fsSL -o").unwrap();
        let config = text.find("./config.sh --unattended").unwrap();
        let run = text.find("exec ./run.sh").unwrap();

        assert!(docker < download && download < config && config < run);
        assert!(text.starts_with("#!/bin/bash\n"));
        assert!(text.contains("export RUNNER_ALLOW_RUNASROOT=1"));
    }

    #[test]
    fn test_both_package_manager_families() {
        let (_, script) = render(None);
        assert!(script.as_str().contains("command -v apt-get"));
        assert!(script.as_str().contains("command -v yum"));
        assert!(!script.as_str().contains("sudo"));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_debug_hides_script() {
        let (_, script) = render(None);
        assert!(!format!("{:?}", script).contains(TOKEN));
    }

    #[test]
    fn test_arch_from_uname() {
        assert_eq!(Arch::from_uname("x86_64\n"), Some(Arch::X64));
        assert_eq!(Arch::from_uname("amd64"), Some(Arch::X64));
        assert_eq!(Arch::from_uname("aarch64"), Some(Arch::Arm64));
        assert_eq!(Arch::from_uname("arm64"), Some(Arch::Arm64));
        assert_eq!(Arch::from_uname("s390x"), None);
    }
}
