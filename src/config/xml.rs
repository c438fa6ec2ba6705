// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! XML startup configuration loader.
//!
//! Mirrors the tag grammar of `examples/original_source/server/alertRserver.py`'s
//! `parseRuleRecursively`, but expressed as a `serde`-deserializable document
//! tree instead of hand-rolled `ElementTree` lookups — every XML element maps
//! onto a struct field named after its tag, with `Vec` fields for repeatable
//! tags and `Option` fields for the nine mutually-exclusive rule-body kinds.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::rule::{
    AlertLevelConfig, BooleanOp, RuleBooleanConfig, RuleElementConfig, RuleElementKind,
    RuleHourConfig, RuleMinuteConfig, RuleMonthdayConfig, RuleSecondConfig, RuleSensorConfig,
    RuleStartConfig, RuleWeekdayConfig, TimeZoneRef,
};
use crate::notifier::smtp::SmtpConfig;

/// Everything the process needs at startup, parsed from one XML file.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub log_file: String,
    pub log_level: String,
    pub cert_file: String,
    pub key_file: String,
    pub port: u16,
    pub use_client_certificates: bool,
    pub client_ca_file: Option<String>,
    pub smtp: SmtpConfig,
    pub user_backend_method: String,
    pub storage_backend_method: String,
    pub alert_levels: Vec<AlertLevelConfig>,
}

fn parse_bool(value: &str, attr: &str) -> Result<bool, ConfigError> {
    match value.to_uppercase().as_str() {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        other => Err(ConfigError::Invalid(format!("'{attr}' is not a valid boolean: {other}"))),
    }
}

fn parse_time_zone(value: &str, tag: &str) -> Result<TimeZoneRef, ConfigError> {
    match value {
        "local" => Ok(TimeZoneRef::Local),
        "utc" => Ok(TimeZoneRef::Utc),
        other => {
            Err(ConfigError::Invalid(format!("invalid 'time' attribute in {tag} tag: {other}")))
        }
    }
}

// -- raw XML document tree ---------------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigXml {
    general: GeneralXml,
    smtp: SmtpXml,
    storage: StorageXml,
    #[serde(rename = "alertLevels")]
    alert_levels: AlertLevelsXml,
}

#[derive(Debug, Deserialize)]
struct GeneralXml {
    log: LogXml,
    server: ServerSectionXml,
    client: ClientXml,
}

#[derive(Debug, Deserialize)]
struct LogXml {
    #[serde(rename = "@file")]
    file: String,
    #[serde(rename = "@level")]
    level: String,
}

#[derive(Debug, Deserialize)]
struct ServerSectionXml {
    #[serde(rename = "@certFile")]
    cert_file: String,
    #[serde(rename = "@keyFile")]
    key_file: String,
    #[serde(rename = "@port")]
    port: u16,
}

#[derive(Debug, Deserialize)]
struct ClientXml {
    #[serde(rename = "@useClientCertificates")]
    use_client_certificates: String,
    #[serde(rename = "@clientCAFile")]
    client_ca_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SmtpXml {
    general: SmtpGeneralXml,
    server: Option<SmtpServerXml>,
}

#[derive(Debug, Deserialize)]
struct SmtpGeneralXml {
    #[serde(rename = "@activated")]
    activated: String,
    #[serde(rename = "@fromAddr")]
    from_addr: Option<String>,
    #[serde(rename = "@toAddr")]
    to_addr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SmtpServerXml {
    #[serde(rename = "@host")]
    host: String,
    #[serde(rename = "@port")]
    port: u16,
}

#[derive(Debug, Deserialize)]
struct StorageXml {
    #[serde(rename = "userBackend")]
    user_backend: MethodXml,
    #[serde(rename = "storageBackend")]
    storage_backend: MethodXml,
}

#[derive(Debug, Deserialize)]
struct MethodXml {
    #[serde(rename = "@method")]
    method: String,
}

#[derive(Debug, Deserialize, Default)]
struct AlertLevelsXml {
    #[serde(rename = "alertLevel", default)]
    alert_level: Vec<AlertLevelXml>,
}

#[derive(Debug, Deserialize)]
struct AlertLevelXml {
    general: AlertLevelGeneralXml,
    smtp: AlertLevelSmtpXml,
    rules: RulesXml,
}

#[derive(Debug, Deserialize)]
struct AlertLevelGeneralXml {
    #[serde(rename = "@level")]
    level: i64,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@triggerAlways")]
    trigger_always: String,
}

#[derive(Debug, Deserialize)]
struct AlertLevelSmtpXml {
    #[serde(rename = "@emailAlert")]
    email_alert: String,
    #[serde(rename = "@toAddr")]
    to_addr: String,
}

#[derive(Debug, Deserialize, Default)]
struct RulesXml {
    #[serde(rename = "@activated")]
    activated: String,
    #[serde(rename = "rule", default)]
    rule: Vec<RuleXml>,
}

#[derive(Debug, Deserialize)]
struct RuleXml {
    #[serde(rename = "@order")]
    order: i64,
    #[serde(rename = "@minTimeAfterPrev")]
    min_time_after_prev: f64,
    #[serde(rename = "@maxTimeAfterPrev")]
    max_time_after_prev: f64,
    #[serde(rename = "@counterActivated")]
    counter_activated: String,
    #[serde(rename = "@counterLimit")]
    counter_limit: Option<i64>,
    #[serde(rename = "@counterWaitTime")]
    counter_wait_time: Option<f64>,
    #[serde(flatten)]
    body: BoolElemXml,
}

/// The nine mutually-exclusive rule-body tags of the `RuleElement` grammar.
/// Shared by `<rule>` (the `RuleStart` body) and by `<and>`/`<or>`/`<not>`
/// children, exactly as `parseRuleRecursively` walks both the same way.
#[derive(Debug, Deserialize, Default)]
struct BoolElemXml {
    #[serde(rename = "or", default)]
    or: Vec<NestedBoolElemXml>,
    #[serde(rename = "and", default)]
    and: Vec<NestedBoolElemXml>,
    #[serde(rename = "not", default)]
    not: Vec<NestedBoolElemXml>,
    #[serde(rename = "sensor", default)]
    sensor: Vec<SensorElemXml>,
    #[serde(rename = "weekday", default)]
    weekday: Vec<WeekdayElemXml>,
    #[serde(rename = "monthday", default)]
    monthday: Vec<MonthdayElemXml>,
    #[serde(rename = "hour", default)]
    hour: Vec<HourElemXml>,
    #[serde(rename = "minute", default)]
    minute: Vec<MinuteElemXml>,
    #[serde(rename = "second", default)]
    second: Vec<SecondElemXml>,
}

#[derive(Debug, Deserialize)]
struct NestedBoolElemXml {
    #[serde(flatten)]
    body: BoolElemXml,
}

#[derive(Debug, Deserialize)]
struct SensorElemXml {
    #[serde(rename = "@username")]
    username: String,
    #[serde(rename = "@remoteSensorId")]
    remote_sensor_id: i64,
    #[serde(rename = "@timeTriggeredFor")]
    time_triggered_for: f64,
}

#[derive(Debug, Deserialize)]
struct WeekdayElemXml {
    #[serde(rename = "@time")]
    time: String,
    #[serde(rename = "@weekday")]
    weekday: u8,
}

#[derive(Debug, Deserialize)]
struct MonthdayElemXml {
    #[serde(rename = "@time")]
    time: String,
    #[serde(rename = "@monthday")]
    monthday: u8,
}

#[derive(Debug, Deserialize)]
struct HourElemXml {
    #[serde(rename = "@time")]
    time: String,
    #[serde(rename = "@start")]
    start: u8,
    #[serde(rename = "@end")]
    end: u8,
}

#[derive(Debug, Deserialize)]
struct MinuteElemXml {
    #[serde(rename = "@start")]
    start: u8,
    #[serde(rename = "@end")]
    end: u8,
}

#[derive(Debug, Deserialize)]
struct SecondElemXml {
    #[serde(rename = "@start")]
    start: u8,
    #[serde(rename = "@end")]
    end: u8,
}

// -- raw tree -> immutable model ---------------------------------------------

/// Walks a `BoolElemXml` depth-first, assigning `eval_id`s in the same order
/// `RuleEvalState::elements` must be indexed.
fn build_element(body: &BoolElemXml, next_id: &mut usize) -> Result<RuleElementConfig, ConfigError> {
    let count = body.or.len()
        + body.and.len()
        + body.not.len()
        + body.sensor.len()
        + body.weekday.len()
        + body.monthday.len()
        + body.hour.len()
        + body.minute.len()
        + body.second.len();
    if count != 1 {
        return Err(ConfigError::Invalid(format!(
            "expected exactly one rule tag, found {count}"
        )));
    }

    let eval_id = *next_id;
    *next_id += 1;

    let kind = if let Some(b) = body.or.first() {
        RuleElementKind::Boolean(RuleBooleanConfig {
            op: BooleanOp::Or,
            children: build_children(&b.body, next_id)?,
        })
    } else if let Some(b) = body.and.first() {
        RuleElementKind::Boolean(RuleBooleanConfig {
            op: BooleanOp::And,
            children: build_children(&b.body, next_id)?,
        })
    } else if let Some(b) = body.not.first() {
        let children = build_children(&b.body, next_id)?;
        if children.len() != 1 {
            return Err(ConfigError::Invalid(
                "'not' tag must contain exactly one child tag".into(),
            ));
        }
        RuleElementKind::Boolean(RuleBooleanConfig { op: BooleanOp::Not, children })
    } else if let Some(s) = body.sensor.first() {
        return Ok(RuleElementConfig {
            eval_id,
            kind: RuleElementKind::Sensor(RuleSensorConfig {
                username: s.username.clone(),
                remote_sensor_id: s.remote_sensor_id,
            }),
            time_triggered_for: s.time_triggered_for,
        });
    } else if let Some(w) = body.weekday.first() {
        if w.weekday > 6 {
            return Err(ConfigError::Invalid("'weekday' attribute out of [0,6]".into()));
        }
        RuleElementKind::Weekday(RuleWeekdayConfig {
            time: parse_time_zone(&w.time, "weekday")?,
            weekday: w.weekday,
        })
    } else if let Some(m) = body.monthday.first() {
        if !(1..=31).contains(&m.monthday) {
            return Err(ConfigError::Invalid("'monthday' attribute out of [1,31]".into()));
        }
        RuleElementKind::Monthday(RuleMonthdayConfig {
            time: parse_time_zone(&m.time, "monthday")?,
            monthday: m.monthday,
        })
    } else if let Some(h) = body.hour.first() {
        if h.start > 23 || h.end > 23 || h.start > h.end {
            return Err(ConfigError::Invalid("invalid 'start'/'end' in hour tag".into()));
        }
        RuleElementKind::Hour(RuleHourConfig {
            time: parse_time_zone(&h.time, "hour")?,
            start: h.start,
            end: h.end,
        })
    } else if let Some(m) = body.minute.first() {
        if m.start > 59 || m.end > 59 || m.start > m.end {
            return Err(ConfigError::Invalid("invalid 'start'/'end' in minute tag".into()));
        }
        RuleElementKind::Minute(RuleMinuteConfig { start: m.start, end: m.end })
    } else if let Some(s) = body.second.first() {
        if s.start > 59 || s.end > 59 || s.start > s.end {
            return Err(ConfigError::Invalid("invalid 'start'/'end' in second tag".into()));
        }
        RuleElementKind::Second(RuleSecondConfig { start: s.start, end: s.end })
    } else {
        unreachable!("count == 1 guarantees one branch matched")
    };

    Ok(RuleElementConfig { eval_id, kind, time_triggered_for: 0.0 })
}

/// `<and>`/`<or>` may hold any number of children of any of the nine kinds,
/// unlike `<not>` which holds exactly one.
fn build_children(
    body: &BoolElemXml,
    next_id: &mut usize,
) -> Result<Vec<RuleElementConfig>, ConfigError> {
    let mut children = Vec::new();
    for b in &body.or {
        let eval_id = *next_id;
        *next_id += 1;
        let inner = build_children(&b.body, next_id)?;
        children.push(RuleElementConfig {
            eval_id,
            kind: RuleElementKind::Boolean(RuleBooleanConfig { op: BooleanOp::Or, children: inner }),
            time_triggered_for: 0.0,
        });
    }
    for b in &body.and {
        let eval_id = *next_id;
        *next_id += 1;
        let inner = build_children(&b.body, next_id)?;
        children.push(RuleElementConfig {
            eval_id,
            kind: RuleElementKind::Boolean(RuleBooleanConfig { op: BooleanOp::And, children: inner }),
            time_triggered_for: 0.0,
        });
    }
    for b in &body.not {
        let eval_id = *next_id;
        *next_id += 1;
        let inner = build_children(&b.body, next_id)?;
        if inner.len() != 1 {
            return Err(ConfigError::Invalid(
                "'not' tag must contain exactly one child tag".into(),
            ));
        }
        children.push(RuleElementConfig {
            eval_id,
            kind: RuleElementKind::Boolean(RuleBooleanConfig { op: BooleanOp::Not, children: inner }),
            time_triggered_for: 0.0,
        });
    }
    for s in &body.sensor {
        let eval_id = *next_id;
        *next_id += 1;
        children.push(RuleElementConfig {
            eval_id,
            kind: RuleElementKind::Sensor(RuleSensorConfig {
                username: s.username.clone(),
                remote_sensor_id: s.remote_sensor_id,
            }),
            time_triggered_for: s.time_triggered_for,
        });
    }
    for w in &body.weekday {
        if w.weekday > 6 {
            return Err(ConfigError::Invalid("'weekday' attribute out of [0,6]".into()));
        }
        children.push(build_single(
            RuleElementKind::Weekday(RuleWeekdayConfig {
                time: parse_time_zone(&w.time, "weekday")?,
                weekday: w.weekday,
            }),
            next_id,
        ));
    }
    for m in &body.monthday {
        if !(1..=31).contains(&m.monthday) {
            return Err(ConfigError::Invalid("'monthday' attribute out of [1,31]".into()));
        }
        children.push(build_single(
            RuleElementKind::Monthday(RuleMonthdayConfig {
                time: parse_time_zone(&m.time, "monthday")?,
                monthday: m.monthday,
            }),
            next_id,
        ));
    }
    for h in &body.hour {
        if h.start > 23 || h.end > 23 || h.start > h.end {
            return Err(ConfigError::Invalid("invalid 'start'/'end' in hour tag".into()));
        }
        children.push(build_single(
            RuleElementKind::Hour(RuleHourConfig {
                time: parse_time_zone(&h.time, "hour")?,
                start: h.start,
                end: h.end,
            }),
            next_id,
        ));
    }
    for m in &body.minute {
        if m.start > 59 || m.end > 59 || m.start > m.end {
            return Err(ConfigError::Invalid("invalid 'start'/'end' in minute tag".into()));
        }
        children.push(build_single(
            RuleElementKind::Minute(RuleMinuteConfig { start: m.start, end: m.end }),
            next_id,
        ));
    }
    for s in &body.second {
        if s.start > 59 || s.end > 59 || s.start > s.end {
            return Err(ConfigError::Invalid("invalid 'start'/'end' in second tag".into()));
        }
        children.push(build_single(
            RuleElementKind::Second(RuleSecondConfig { start: s.start, end: s.end }),
            next_id,
        ));
    }
    Ok(children)
}

/// Assigns the next `eval_id` to a leaf (childless) rule element.
fn build_single(kind: RuleElementKind, next_id: &mut usize) -> RuleElementConfig {
    let eval_id = *next_id;
    *next_id += 1;
    RuleElementConfig { eval_id, kind, time_triggered_for: 0.0 }
}

fn build_rule(rule: &RuleXml) -> Result<RuleStartConfig, ConfigError> {
    if rule.min_time_after_prev > rule.max_time_after_prev {
        return Err(ConfigError::Invalid(format!(
            "rule order {}: minTimeAfterPrev greater than maxTimeAfterPrev",
            rule.order
        )));
    }
    let counter_activated = parse_bool(&rule.counter_activated, "counterActivated")?;
    let (counter_limit, counter_wait_time) = if counter_activated {
        let limit = rule.counter_limit.ok_or_else(|| {
            ConfigError::Invalid(format!("rule order {}: missing counterLimit", rule.order))
        })?;
        if limit < 0 {
            return Err(ConfigError::Invalid("counterLimit must be >= 0".into()));
        }
        let wait = rule.counter_wait_time.ok_or_else(|| {
            ConfigError::Invalid(format!("rule order {}: missing counterWaitTime", rule.order))
        })?;
        if wait < 0.0 {
            return Err(ConfigError::Invalid("counterWaitTime must be >= 0".into()));
        }
        (limit, wait)
    } else {
        (0, 0.0)
    };

    let mut next_id = 0usize;
    let body = build_element(&rule.body, &mut next_id)?;

    Ok(RuleStartConfig {
        order: rule.order,
        min_time_after_prev: rule.min_time_after_prev,
        max_time_after_prev: rule.max_time_after_prev,
        counter_activated,
        counter_limit,
        counter_wait_time,
        body,
    })
}

fn build_alert_level(
    item: &AlertLevelXml,
    smtp_activated: bool,
) -> Result<AlertLevelConfig, ConfigError> {
    let smtp_activated_for_level = parse_bool(&item.smtp.email_alert, "emailAlert")?;
    if smtp_activated_for_level && !smtp_activated {
        return Err(ConfigError::Invalid(format!(
            "alert level {} has emailAlert activated but smtp is not activated",
            item.general.level
        )));
    }
    let rules_activated = parse_bool(&item.rules.activated, "activated")?;
    let mut rules = if rules_activated {
        item.rules.rule.iter().map(build_rule).collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };
    rules.sort_by_key(|r| r.order);
    let mut seen = std::collections::HashSet::new();
    for r in &rules {
        if !seen.insert(r.order) {
            return Err(ConfigError::DuplicateRuleOrder(r.order));
        }
    }

    Ok(AlertLevelConfig {
        level: item.general.level,
        name: item.general.name.clone(),
        trigger_always: parse_bool(&item.general.trigger_always, "triggerAlways")?,
        smtp_activated: smtp_activated_for_level,
        to_addr: item.smtp.to_addr.clone(),
        rules_activated,
        rules,
    })
}

/// Load and validate `path` into a [`ServerConfig`].
pub fn load(path: &Path) -> Result<ServerConfig, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let doc: ConfigXml =
        quick_xml::de::from_str(&contents).map_err(|e| ConfigError::Xml(e.to_string()))?;

    if !Path::new(&doc.general.server.cert_file).exists() {
        return Err(ConfigError::Invalid(format!(
            "server certificate does not exist: {}",
            doc.general.server.cert_file
        )));
    }
    if !Path::new(&doc.general.server.key_file).exists() {
        return Err(ConfigError::Invalid(format!(
            "server key does not exist: {}",
            doc.general.server.key_file
        )));
    }

    let use_client_certificates =
        parse_bool(&doc.general.client.use_client_certificates, "useClientCertificates")?;
    if use_client_certificates {
        let ca = doc
            .general
            .client
            .client_ca_file
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("clientCAFile missing".into()))?;
        if !Path::new(ca).exists() {
            return Err(ConfigError::Invalid(format!("client CA file does not exist: {ca}")));
        }
    }

    let smtp_activated = parse_bool(&doc.smtp.general.activated, "activated")?;
    let smtp = SmtpConfig {
        activated: smtp_activated,
        from_addr: doc.smtp.general.from_addr.clone().unwrap_or_default(),
        admin_to_addr: doc.smtp.general.to_addr.clone().unwrap_or_default(),
        host: doc.smtp.server.as_ref().map(|s| s.host.clone()).unwrap_or_default(),
        port: doc.smtp.server.as_ref().map(|s| s.port).unwrap_or(25),
    };

    let mut alert_levels = doc
        .alert_levels
        .alert_level
        .iter()
        .map(|item| build_alert_level(item, smtp_activated))
        .collect::<Result<Vec<_>, _>>()?;
    alert_levels.sort_by_key(|l| l.level);
    let mut seen_levels = std::collections::HashSet::new();
    for level in &alert_levels {
        if !seen_levels.insert(level.level) {
            return Err(ConfigError::DuplicateAlertLevel(level.level));
        }
    }

    Ok(ServerConfig {
        log_file: doc.general.log.file,
        log_level: doc.general.log.level,
        cert_file: doc.general.server.cert_file,
        key_file: doc.general.server.key_file,
        port: doc.general.server.port,
        use_client_certificates,
        client_ca_file: doc.general.client.client_ca_file,
        smtp,
        user_backend_method: doc.storage.user_backend.method,
        storage_backend_method: doc.storage.storage_backend.method,
        alert_levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(xml: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, b"cert").unwrap_or_else(|e| panic!("write cert: {e}"));
        std::fs::write(&key, b"key").unwrap_or_else(|e| panic!("write key: {e}"));
        let xml = xml.replace("__CERT__", &cert.display().to_string()).replace(
            "__KEY__",
            &key.display().to_string(),
        );
        let path = dir.path().join("config.xml");
        let mut f = std::fs::File::create(&path).unwrap_or_else(|e| panic!("create: {e}"));
        f.write_all(xml.as_bytes()).unwrap_or_else(|e| panic!("write: {e}"));
        (dir, path)
    }

    const BASE: &str = r#"
<config version="0.221">
  <general>
    <log file="/tmp/log" level="info" />
    <server certFile="__CERT__" keyFile="__KEY__" port="6333" />
    <client useClientCertificates="false" />
  </general>
  <smtp>
    <general activated="false" />
  </smtp>
  <storage>
    <userBackend method="csv" />
    <storageBackend method="sqlite" />
  </storage>
  <alertLevels>
    <alertLevel>
      <general level="1" name="test" triggerAlways="false" />
      <smtp emailAlert="false" toAddr="" />
      <rules activated="true">
        <rule order="1" minTimeAfterPrev="0" maxTimeAfterPrev="0" counterActivated="false">
          <sensor username="s1" remoteSensorId="7" timeTriggeredFor="0" />
        </rule>
      </rules>
    </alertLevel>
  </alertLevels>
</config>
"#;

    #[test]
    fn parses_single_sensor_rule() {
        let (_dir, path) = write_config(BASE);
        let config = load(&path).unwrap_or_else(|e| panic!("load: {e}"));
        assert_eq!(config.alert_levels.len(), 1);
        assert_eq!(config.alert_levels[0].rules.len(), 1);
        assert!(matches!(
            config.alert_levels[0].rules[0].body.kind,
            RuleElementKind::Sensor(_)
        ));
    }

    #[test]
    fn rejects_duplicate_alert_levels() {
        let xml = BASE.replace(
            "</alertLevels>",
            r#"<alertLevel>
                <general level="1" name="dup" triggerAlways="false" />
                <smtp emailAlert="false" toAddr="" />
                <rules activated="false" />
            </alertLevel></alertLevels>"#,
        );
        let (_dir, path) = write_config(&xml);
        assert!(matches!(load(&path), Err(ConfigError::DuplicateAlertLevel(1))));
    }

    #[test]
    fn rejects_min_greater_than_max() {
        let xml = BASE.replace(
            r#"minTimeAfterPrev="0" maxTimeAfterPrev="0""#,
            r#"minTimeAfterPrev="5" maxTimeAfterPrev="1""#,
        );
        let (_dir, path) = write_config(&xml);
        assert!(load(&path).is_err());
    }

    #[test]
    fn and_rule_parses_multiple_children() {
        let xml = BASE.replace(
            r#"<sensor username="s1" remoteSensorId="7" timeTriggeredFor="0" />"#,
            r#"<and>
                <sensor username="s1" remoteSensorId="7" timeTriggeredFor="0" />
                <hour time="local" start="8" end="17" />
            </and>"#,
        );
        let (_dir, path) = write_config(&xml);
        let config = load(&path).unwrap_or_else(|e| panic!("load: {e}"));
        let RuleElementKind::Boolean(ref b) = config.alert_levels[0].rules[0].body.kind else {
            panic!("expected boolean root");
        };
        assert_eq!(b.op, BooleanOp::And);
        assert_eq!(b.children.len(), 2);
    }
}
