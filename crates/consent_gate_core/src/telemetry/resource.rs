//! Build provenance and the telemetry resource derived from it.
//!
//! The resource is computed once at startup from the metadata the binary was
//! built with, and attached to every exported span and log record.
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

/// Placeholder for metadata the build did not provide.
pub const NOT_AVAILABLE: &str = "n/a";

/// Build setting holding the source-control revision.
pub const VCS_REVISION_SETTING: &str = "vcs.revision";

pub const SERVICE_NAME_KEY: &str = "service.name";
pub const SERVICE_VERSION_KEY: &str = "service.version";
pub const GIT_REVISION_KEY: &str = "git_sha";
pub const APPLICATION_KEY: &str = "app";

/// Semantic conventions version the attribute keys follow.
pub const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.18.0";

/// Captures the [`BuildInfo`] of the crate invoking the macro.
///
/// The revision is read from `CONSENT_GATE_VCS_REVISION`, which the server
/// build script sets from `git rev-parse HEAD` when a checkout is available.
#[macro_export]
macro_rules! build_info {
    () => {{
        let info =
            $crate::telemetry::BuildInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
                .with_main_path(module_path!());
        match option_env!("CONSENT_GATE_VCS_REVISION") {
            Some(revision) => {
                info.with_setting($crate::telemetry::resource::VCS_REVISION_SETTING, revision)
            }
            None => info,
        }
    }};
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BuildSetting {
    pub key: String,
    pub value: String,
}

/// Metadata embedded in the binary at build time.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BuildInfo {
    /// Package path of the build, used as fallback service name.
    pub path: String,
    /// Path of the main module.
    pub main_path: String,
    pub version: String,
    pub settings: Vec<BuildSetting>,
}

impl BuildInfo {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        let path = path.into();
        Self { main_path: path.clone(), path, version: version.into(), settings: Vec::new() }
    }

    pub fn with_main_path(self, main_path: impl Into<String>) -> Self {
        Self { main_path: main_path.into(), ..self }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push(BuildSetting { key: key.into(), value: value.into() });
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.iter().find(|setting| setting.key == key).map(|setting| setting.value.as_str())
    }

    /// Source-control revision, `"n/a"` when the build did not record one.
    pub fn git_revision(&self) -> &str {
        self.setting(VCS_REVISION_SETTING).unwrap_or(NOT_AVAILABLE)
    }
}

/// Process-wide identification attached to all telemetry.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServiceResource {
    service_name: String,
    service_version: String,
    git_revision: Option<String>,
    application_path: Option<String>,
}

impl ServiceResource {
    /// Builds the resource from a service name hint and the build metadata.
    ///
    /// An empty hint falls back to the build path. Without build metadata the
    /// resource only carries a service name and an `"n/a"` version.
    pub fn build(service_name_hint: &str, build_info: Option<&BuildInfo>) -> Self {
        let hint = (!service_name_hint.is_empty()).then(|| service_name_hint.to_string());
        match build_info {
            Some(info) => Self {
                service_name: hint.unwrap_or_else(|| info.path.clone()),
                service_version: if info.version.is_empty() {
                    NOT_AVAILABLE.to_string()
                } else {
                    info.version.clone()
                },
                git_revision: Some(info.git_revision().to_string()),
                application_path: Some(info.main_path.clone()),
            },
            None => Self {
                service_name: hint.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                service_version: NOT_AVAILABLE.to_string(),
                git_revision: None,
                application_path: None,
            },
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }

    pub fn git_revision(&self) -> Option<&str> {
        self.git_revision.as_deref()
    }

    pub fn application_path(&self) -> Option<&str> {
        self.application_path.as_deref()
    }

    pub fn attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new(SERVICE_NAME_KEY, self.service_name.clone()),
            KeyValue::new(SERVICE_VERSION_KEY, self.service_version.clone()),
        ];
        if let Some(revision) = &self.git_revision {
            attributes.push(KeyValue::new(GIT_REVISION_KEY, revision.clone()));
        }
        if let Some(application) = &self.application_path {
            attributes.push(KeyValue::new(APPLICATION_KEY, application.clone()));
        }
        attributes
    }

    /// SDK resource carrying exactly [`Self::attributes`], tagged with [`SCHEMA_URL`].
    pub fn to_otel(&self) -> Resource {
        Resource::builder_empty().with_schema_url(self.attributes(), SCHEMA_URL).build()
    }
}
