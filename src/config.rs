use std::{
    collections::BTreeMap,
    env,
    fs::File,
    io::{self, BufRead as _, BufReader},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

/// An error encountered while loading or resolving a configuration profile.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The config file couldn't be read.
    #[error("Failed to load config file")]
    Io(#[from] io::Error),
    /// The token file couldn't be read.
    #[error("Failed to read token file {}", .0.display())]
    TokenFile(PathBuf, #[source] io::Error),
    /// The config file isn't valid YAML, or has the wrong shape.
    #[error("Invalid configuration")]
    Invalid(#[from] serde_yaml::Error),
    /// The requested profile isn't in the config file.
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),
    /// The token can't be sent in a header.
    #[error("Token contains invalid characters")]
    InvalidToken,
    /// Neither the profile nor the environment set a database URL.
    #[error("No database URL found")]
    NoDatabaseUrl,
    /// The database URL couldn't be parsed.
    #[error("Invalid URI")]
    InvalidUri(#[from] http::uri::InvalidUri),
}

/// A fully resolved set of connection settings for a Baserow instance.
#[derive(Clone)]
pub struct Profile {
    /// The name of the profile.
    pub name: String,
    /// The base URL of the Baserow instance, e.g. `https://baserow.example.com`.
    /// A path prefix is kept when building request URLs.
    pub database_url: http::Uri,
    /// The database token. Requests are sent unauthenticated if unset.
    pub token: Option<String>,
    /// The user-agent used on requests. Intended for internal use.
    pub user_agent: String,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("database_url", &self.database_url)
            .field("token", &self.token.as_ref().map(|_| "********"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// A profile stored in the config file.
#[derive(Debug, Default, Clone, Deserialize)]
struct ConfigProfile {
    database_url: Option<String>,
    token: Option<String>,
    token_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct Config {
    profiles: BTreeMap<String, ConfigProfile>,
}

impl Profile {
    /// Build a profile directly.
    ///
    /// An explicit `token` always wins; `token_path` is only read if no token
    /// is given. With neither, requests are sent without an `Authorization`
    /// header and the service will reject them.
    pub fn new(
        database_url: &str,
        token: Option<String>,
        token_path: Option<&Path>,
    ) -> Result<Self, Error> {
        let token = resolve_token(token, token_path)?;

        Ok(Self {
            name: "default".to_owned(),
            database_url: database_url.parse()?,
            token,
            user_agent: make_ua(None),
        })
    }

    /// Load the given profile from the configuration file (usually
    /// ~/.config/baserow.yaml). If no configuration file is present, then the
    /// configuration will be loaded solely from the environment.
    ///
    /// If `BASEROW_PROFILE` is set, that will be used to select the profile.
    /// Otherwise the profile `default` will be used.
    pub fn from_default_env() -> Result<Self, Error> {
        if let Ok(s) = env::var("BASEROW_PROFILE") {
            Self::from_env(&s)
        } else {
            Self::from_env("default")
        }
    }

    /// Load the given profile from the configuration file (usually
    /// ~/.config/baserow.yaml). If no configuration file is present, then the
    /// configuration will be loaded solely from the environment.
    ///
    /// The following environment variables can override the corresponding
    /// values in the config file:
    ///
    /// | Environment Variable    | Config Value   |
    /// |-------------------------|----------------|
    /// | `BASEROW_DATABASE_URL`  | `database_url` |
    /// | `BASEROW_TOKEN`         | `token`        |
    /// | `BASEROW_TOKEN_PATH`    | `token_path`   |
    ///
    /// `BASEROW_TOKEN` and `BASEROW_TOKEN_PATH` override as a pair: if either
    /// is set, neither token setting from the config file is used.
    pub fn from_env(name: &str) -> Result<Self, Error> {
        let overrides = ConfigProfile {
            database_url: env::var("BASEROW_DATABASE_URL").ok(),
            token: env::var("BASEROW_TOKEN").ok(),
            token_path: env::var_os("BASEROW_TOKEN_PATH").map(PathBuf::from),
        };

        Self::from_home(env::home_dir().as_deref(), name, overrides)
    }

    fn from_home(home: Option<&Path>, name: &str, overrides: ConfigProfile) -> Result<Self, Error> {
        let profile = match find_config(home).and_then(|p| read_profile(&p, name)) {
            Ok(p) => p,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config file found");
                Default::default()
            }
            Err(e) => return Err(e),
        };

        let (token, token_path) = if overrides.token.is_some() || overrides.token_path.is_some() {
            (overrides.token, overrides.token_path)
        } else {
            (profile.token, profile.token_path)
        };

        let merged = ConfigProfile {
            database_url: overrides.database_url.or(profile.database_url),
            token,
            token_path,
        };

        Self::from_raw(merged, name.to_owned())
    }

    /// Load the given profile (or 'default') from the given file, which must
    /// be a valid configuration file. Does not read any environment
    /// variables.
    ///
    /// Usually, you will want to use [Profile::from_env] instead.
    pub fn read(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self, Error> {
        let path = path.as_ref();
        let name = name.unwrap_or("default").to_owned();
        let profile = read_profile(path, &name)?;
        Self::from_raw(profile, name)
    }

    /// Modifies the user-agent to have a different prefix. Intended for
    /// internal use.
    #[doc(hidden)]
    pub fn with_ua_product(self, ua_product: &str) -> Self {
        Self {
            user_agent: make_ua(Some(ua_product)),
            ..self
        }
    }

    fn from_raw(raw: ConfigProfile, name: String) -> Result<Self, Error> {
        let ConfigProfile {
            database_url,
            token,
            token_path,
        } = raw;

        let database_url = database_url.ok_or(Error::NoDatabaseUrl)?.parse()?;
        let token = resolve_token(token, token_path.as_deref())?;

        Ok(Self {
            name,
            database_url,
            token,
            user_agent: make_ua(None),
        })
    }
}

/// Read a token from a file. The first line, with surrounding whitespace
/// trimmed, is the token.
pub fn load_token(path: impl AsRef<Path>) -> Result<String, Error> {
    let path = path.as_ref();
    let read = || -> io::Result<String> {
        let mut line = String::new();
        BufReader::new(File::open(path)?).read_line(&mut line)?;
        Ok(line.trim().to_owned())
    };

    read().map_err(|e| Error::TokenFile(path.to_owned(), e))
}

fn resolve_token(token: Option<String>, token_path: Option<&Path>) -> Result<Option<String>, Error> {
    let token = match (token, token_path) {
        (Some(token), _) => Some(token),
        (None, Some(path)) => Some(load_token(path)?),
        (None, None) => None,
    };

    if token.as_deref().is_some_and(|t| !t.is_ascii()) {
        return Err(Error::InvalidToken);
    }

    Ok(token)
}

fn find_config(home: Option<&Path>) -> Result<PathBuf, Error> {
    let Some(home) = home else {
        return Err(Error::Io(io::Error::other(
            "No $HOME found for the current user",
        )));
    };

    let canonical = home.join(".config/baserow.yaml");
    if canonical.exists() {
        return Ok(canonical);
    }

    // Try some fallback paths, and if that doesn't work, return the error from
    // the canonical location.
    for fallback in [
        ".config/baserow.yml",
        ".baserow/config.yaml",
        ".baserow/config.yml",
    ] {
        let path = home.join(fallback);
        if path.exists() {
            return Ok(path);
        }
    }

    Ok(canonical)
}

fn read_profile(p: &Path, name: &str) -> Result<ConfigProfile, Error> {
    let file = File::open(p)?;
    let mut config: Config = serde_yaml::from_reader(file).map_err(Error::Invalid)?;
    let Some(config_profile) = config.profiles.remove(name) else {
        return Err(Error::ProfileNotFound(name.to_string()));
    };

    debug!(path = %p.display(), "loaded config file");

    Ok(config_profile)
}

fn make_ua(product: Option<&str>) -> String {
    format!(
        "{}/{}",
        product.unwrap_or("baserow-rs"),
        env!("CARGO_PKG_VERSION")
    )
}
