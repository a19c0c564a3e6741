//! The device client: what the interpreter and planner need from the unit.
//!
//! The Atrea IAM web module speaks a plain HTTP dialect: `config/xml.cgi`
//! returns the register snapshot as `<O I="H10708" V="0"/>` rows, and writes
//! are register-id-plus-zero-padded-value segments appended to the same
//! endpoint (`xml.cgi?auth=N&H1070800020` sets `H10708` to 20). Pending writes
//! accumulate locally and go out in one batch on [`DeviceClient::exec`], so a
//! command is always a single write-and-commit round trip.

use crate::registers::{Mode, Program};
use crate::snapshot::{ParamTable, Snapshot, Translations};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, trace};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not construct the HTTP client")]
    CreateClient(#[source] reqwest::Error),
    #[error("`{0}` is not a valid unit address ({1})")]
    BadAddress(String, String),
    #[error("login request to the unit failed")]
    Login(#[source] reqwest::Error),
    #[error("the unit rejected the login (`{0}`)")]
    LoginRejected(String),
    #[error("status request to the unit failed")]
    FetchStatus(#[source] reqwest::Error),
    #[error("parameter table request to the unit failed")]
    FetchParams(#[source] reqwest::Error),
    #[error("translation table request to the unit failed")]
    FetchTranslations(#[source] reqwest::Error),
    #[error("write commit request to the unit failed")]
    Commit(#[source] reqwest::Error),
    #[error("the unit did not accept the write batch")]
    CommitRejected,
}

/// The operations the interpreter/planner core consumes.
///
/// Setters only queue a register write; nothing reaches the unit until
/// [`Self::exec`] commits the whole batch. Implementations must never send a
/// second batch without an intervening commit.
///
/// The futures need not be `Send`; everything runs on a current-thread
/// runtime.
#[allow(async_fn_in_trait)]
pub trait DeviceClient {
    async fn get_status(&mut self) -> Result<Option<Snapshot>, Error>;
    async fn get_params(&mut self) -> Result<ParamTable, Error>;
    async fn get_translations(&mut self) -> Result<Translations, Error>;
    fn set_program(&mut self, program: Program);
    fn set_mode(&mut self, mode: Mode);
    fn set_power(&mut self, percent: u8);
    fn set_temperature(&mut self, celsius: f64);
    /// Raw register override, for vendor-specific registers outside the
    /// standard model (zone selection being the one this crate uses).
    fn set_command(&mut self, key: &'static str, value: i64);
    async fn exec(&mut self) -> Result<(), Error>;
}

pub struct HttpClient {
    http: reqwest::Client,
    base: reqwest::Url,
    password: String,
    auth: Option<u64>,
    pending: Vec<(&'static str, i64)>,
}

impl HttpClient {
    pub fn new(host: &str, password: &str, read_timeout: Duration) -> Result<Self, Error> {
        let base = format!("http://{host}/");
        let base = base
            .parse::<reqwest::Url>()
            .map_err(|e| Error::BadAddress(host.to_string(), e.to_string()))?;
        let http = reqwest::Client::builder()
            .read_timeout(read_timeout)
            .timeout(read_timeout * 2)
            .build()
            .map_err(Error::CreateClient)?;
        Ok(Self { http, base, password: password.to_string(), auth: None, pending: Vec::new() })
    }

    /// Probe whether anything resembling an Atrea unit answers at the
    /// configured address.
    pub async fn is_atrea_unit(&self) -> bool {
        let url = self.endpoint("index.html", "");
        match self.http.get(url).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body.contains("ATREA"),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    fn endpoint(&self, path: &str, query: &str) -> reqwest::Url {
        let mut url = self.base.clone();
        url.set_path(path);
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        url
    }

    async fn login(&mut self) -> Result<u64, Error> {
        if let Some(auth) = self.auth {
            return Ok(auth);
        }
        let url = self.endpoint("config/login.cgi", &format!("password={}", self.password));
        let body = self
            .http
            .get(url)
            .send()
            .await
            .map_err(Error::Login)?
            .text()
            .await
            .map_err(Error::Login)?;
        let code = body
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::LoginRejected(body.trim().to_string()))?;
        info!(message = "logged in to the unit");
        self.auth = Some(code);
        Ok(code)
    }

    async fn fetch(
        &mut self,
        path: &str,
        extra_query: &str,
        wrap: fn(reqwest::Error) -> Error,
    ) -> Result<String, Error> {
        let auth = self.login().await?;
        let mut query = format!("auth={auth}");
        query.push_str(extra_query);
        let url = self.endpoint(path, &query);
        trace!(message = "requesting", %url);
        let response = self.http.get(url).send().await.map_err(wrap)?;
        let body = response.text().await.map_err(wrap)?;
        // An expired auth code comes back as a denial rather than an HTTP
        // error; drop the code so the next request logs in again.
        if body.contains("denied") {
            debug!(message = "auth code no longer valid");
            self.auth = None;
        }
        Ok(body)
    }
}

/// Pull the value of a `name="value"` attribute out of one element.
fn attribute<'a>(element: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = element;
    loop {
        let start = rest.find(name)? + name.len();
        rest = &rest[start..];
        if let Some(value) = rest.strip_prefix("=\"") {
            let end = value.find('"')?;
            return Some(&value[..end]);
        }
    }
}

/// Iterate over the `<O …/>` rows of a status-style document.
fn rows(body: &str) -> impl Iterator<Item = &str> {
    body.split("<O")
        .skip(1)
        .filter_map(|chunk| chunk.split('>').next())
}

fn parse_snapshot(body: &str) -> Snapshot {
    rows(body)
        .filter_map(|row| Some((attribute(row, "I")?.to_string(), attribute(row, "V")?.to_string())))
        .collect()
}

fn parse_params(body: &str) -> ParamTable {
    let mut params = ParamTable::default();
    for row in rows(body) {
        let (Some(id), Some(kind)) = (attribute(row, "I"), attribute(row, "T")) else {
            continue;
        };
        match kind {
            "warning" => params.warning.push(id.to_string()),
            "alert" => params.alert.push(id.to_string()),
            other => trace!(kind = other, id, "skipping parameter of unknown kind"),
        }
    }
    params
}

fn parse_translations(body: &str) -> Translations {
    let texts: BTreeMap<String, String> = rows(body)
        .filter_map(|row| Some((attribute(row, "I")?.to_string(), attribute(row, "V")?.to_string())))
        .collect();
    Translations::new(texts)
}

/// Encode one queued write as a query segment: register key followed by the
/// value zero-padded to five digits.
fn encode_write(key: &str, value: i64) -> String {
    format!("{key}{value:05}")
}

impl DeviceClient for HttpClient {
    async fn get_status(&mut self) -> Result<Option<Snapshot>, Error> {
        let body = self.fetch("config/xml.cgi", "", Error::FetchStatus).await?;
        let snapshot = parse_snapshot(&body);
        // No register rows at all means the unit refused to talk to us
        // (wrong password, or too many signed-in users).
        if snapshot.is_empty() {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    async fn get_params(&mut self) -> Result<ParamTable, Error> {
        let body = self.fetch("config/params.cgi", "", Error::FetchParams).await?;
        Ok(parse_params(&body))
    }

    async fn get_translations(&mut self) -> Result<Translations, Error> {
        let body = self
            .fetch("lang/texts.cgi", "", Error::FetchTranslations)
            .await?;
        Ok(parse_translations(&body))
    }

    fn set_program(&mut self, program: Program) {
        self.pending.push(("H10701", program.raw()));
    }

    fn set_mode(&mut self, mode: Mode) {
        self.pending.push(("H10705", i64::from(mode as u8)));
    }

    fn set_power(&mut self, percent: u8) {
        self.pending.push(("H10708", i64::from(percent)));
    }

    fn set_temperature(&mut self, celsius: f64) {
        self.pending.push(("H10706", (celsius * 10.0).round() as i64));
    }

    fn set_command(&mut self, key: &'static str, value: i64) {
        self.pending.push((key, value));
    }

    async fn exec(&mut self) -> Result<(), Error> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let writes = std::mem::take(&mut self.pending);
        let mut query = String::new();
        for (key, value) in &writes {
            query.push('&');
            query.push_str(&encode_write(key, *value));
        }
        debug!(message = "committing writes", count = writes.len());
        let body = self.fetch("config/xml.cgi", &query, Error::Commit).await?;
        if body.contains("denied") || !body.contains("<O") {
            return Err(Error::CommitRejected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_rows_parse() {
        let body = r#"<root><O I="H10708" V="0"/><O I="I10202" V="215"/></root>"#;
        let snapshot = parse_snapshot(body);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.raw("H10708"), Some(0));
        assert_eq!(snapshot.value("I10202"), Some(21.5));
    }

    #[test]
    fn params_keep_declaration_order() {
        let body = concat!(
            r#"<O I="H10503" T="warning"/>"#,
            r#"<O I="H10501" T="warning"/>"#,
            r#"<O I="H10601" T="alert"/>"#,
            r#"<O I="H10999" T="notice"/>"#,
        );
        let params = parse_params(body);
        assert_eq!(params.warning, vec!["H10503", "H10501"]);
        assert_eq!(params.alert, vec!["H10601"]);
    }

    #[test]
    fn write_encoding_pads_to_five_digits() {
        assert_eq!(encode_write("H10708", 20), "H1070800020");
        assert_eq!(encode_write("H10708", 100), "H1070800100");
        assert_eq!(encode_write("H10706", 215), "H1070600215");
        assert_eq!(encode_write("H10705", 0), "H1070500000");
    }

    #[test]
    fn attribute_scanner_ignores_other_attributes() {
        let row = r#" X="9" I="H10705" V="2" "#;
        assert_eq!(attribute(row, "I"), Some("H10705"));
        assert_eq!(attribute(row, "V"), Some("2"));
        assert_eq!(attribute(row, "Z"), None);
    }
}
