//! Configuration artifact trees ready to be committed.
//!
//! A [`ConfigArtifact`] renders the three files the built-in `config`
//! resolver reads: `node.toml`, `schema.toml` and `config.json`.

/// Schema with a plain, an encrypted, a fixed and a list field.
///
/// `host`, `password` and every `servers/url` are environment specific;
/// `port` is not.
pub const SCHEMA: &str = r#"[[fields]]
name = "host"
environment_specific = true

[[fields]]
name = "port"
type = "long"

[[fields]]
name = "password"
environment_specific = true
encrypted = true

[[fields]]
name = "servers"
list = true

[[fields.children]]
name = "url"
environment_specific = true
"#;

/// One artifact directory using the `config` manager.
#[derive(Debug, Clone)]
pub struct ConfigArtifact {
    dir: String,
    version: String,
    references: Vec<String>,
    host: String,
    password: String,
    servers: Vec<String>,
    files: Vec<(String, String)>,
}

impl ConfigArtifact {
    pub fn new(dir: &str) -> Self {
        let mut artifact = Self {
            dir: dir.to_string(),
            version: "1".to_string(),
            references: Vec::new(),
            host: "localhost".to_string(),
            password: "secret".to_string(),
            servers: Vec::new(),
            files: Vec::new(),
        };
        artifact.render();
        artifact
    }

    /// Descriptor version; bumping it marks the artifact as changed.
    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self.render();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self.render();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self.render();
        self
    }

    pub fn servers(mut self, urls: &[&str]) -> Self {
        self.servers = urls.iter().map(|u| u.to_string()).collect();
        self.render();
        self
    }

    /// Artifact ids this one depends on.
    pub fn references(mut self, ids: &[&str]) -> Self {
        self.references = ids.iter().map(|r| r.to_string()).collect();
        self.render();
        self
    }

    /// `(path, content)` pairs for a fixture commit.
    pub fn files(&self) -> Vec<(&str, &str)> {
        self.files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
            .collect()
    }

    fn render(&mut self) {
        let references = self
            .references
            .iter()
            .map(|r| format!("\"{r}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let node = format!(
            "name = \"{dir}\"\nmanager = \"config\"\nversion = \"{version}\"\n\
             last_modified = \"2024-01-01T00:00:00Z\"\ntags = [\"config\"]\n\
             references = [{references}]\n",
            dir = self.dir,
            version = self.version,
        );
        let servers = self
            .servers
            .iter()
            .map(|url| format!("{{\"url\": \"{url}\"}}"))
            .collect::<Vec<_>>()
            .join(", ");
        let values = format!(
            "{{\"host\": \"{}\", \"port\": 5432, \"password\": \"{}\", \"servers\": [{servers}]}}\n",
            self.host, self.password
        );

        self.files = vec![
            (self.path("node.toml"), node),
            (self.path("schema.toml"), SCHEMA.to_string()),
            (self.path("config.json"), values),
        ];
    }

    fn path(&self, file: &str) -> String {
        format!("{}/{file}", self.dir)
    }
}
