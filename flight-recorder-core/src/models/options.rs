use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::error::{ProtocolFault, RecorderError};

const EMPTY: &str = "";
const NO_LIMIT: &str = "0";
const FALSE: &str = "false";

/// `<integer>[ <unit>]`, the format the recorder accepts for time spans.
static TIME_SPAN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^([-+]?\d+)\s*(\w*)$"));

const TIME_UNITS: [&str; 7] = ["ns", "us", "ms", "s", "m", "h", "d"];

/// Recording options understood by the remote recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordingOption {
    Name,
    MaxAge,
    MaxSize,
    DumpOnExit,
    Destination,
    Disk,
    Duration,
}

impl RecordingOption {
    pub const ALL: [RecordingOption; 7] = [
        Self::Name,
        Self::MaxAge,
        Self::MaxSize,
        Self::DumpOnExit,
        Self::Destination,
        Self::Disk,
        Self::Duration,
    ];

    /// Key used on the wire.
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::MaxAge => "maxAge",
            Self::MaxSize => "maxSize",
            Self::DumpOnExit => "dumpOnExit",
            Self::Destination => "destination",
            Self::Disk => "disk",
            Self::Duration => "duration",
        }
    }

    /// Documented default. The remote side applies it when the key is absent.
    pub fn default_value(self) -> &'static str {
        match self {
            Self::Name | Self::Destination => EMPTY,
            Self::MaxAge | Self::MaxSize | Self::Duration => NO_LIMIT,
            Self::DumpOnExit | Self::Disk => FALSE,
        }
    }

    fn normalize(self, raw: &str) -> Result<String, RecorderError> {
        match self {
            Self::Name | Self::Destination => Ok(raw.trim().to_string()),
            Self::MaxAge | Self::Duration => validate_time_span(self, raw),
            Self::MaxSize => validate_size(raw),
            Self::DumpOnExit | Self::Disk => Ok(coerce_bool(raw).to_string()),
        }
    }
}

impl fmt::Display for RecordingOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Validated, immutable recording options.
///
/// Sparse: a key is present only when its value differs from the documented
/// default, except `disk`, which is always present. Some targets default
/// `disk` to `true`, so the client never leaves it to the remote default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OptionSet {
    options: BTreeMap<String, String>,
}

impl OptionSet {
    pub fn builder() -> OptionSetBuilder {
        OptionSetBuilder::default()
    }

    pub fn get(&self, option: RecordingOption) -> &str {
        self.options
            .get(option.key())
            .map(String::as_str)
            .unwrap_or(option.default_value())
    }

    pub fn name(&self) -> &str {
        self.get(RecordingOption::Name)
    }

    pub fn max_age(&self) -> &str {
        self.get(RecordingOption::MaxAge)
    }

    pub fn max_size(&self) -> &str {
        self.get(RecordingOption::MaxSize)
    }

    pub fn dump_on_exit(&self) -> &str {
        self.get(RecordingOption::DumpOnExit)
    }

    pub fn destination(&self) -> &str {
        self.get(RecordingOption::Destination)
    }

    pub fn disk(&self) -> &str {
        self.get(RecordingOption::Disk)
    }

    pub fn duration(&self) -> &str {
        self.get(RecordingOption::Duration)
    }

    /// The sparse wire mapping.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl Default for OptionSet {
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert(RecordingOption::Disk.key().to_string(), FALSE.to_string());
        Self { options }
    }
}

/// Accumulates raw option inputs; validation happens in [`build`](Self::build).
///
/// An empty or whitespace-only input resets an option to its default.
#[derive(Debug, Clone, Default)]
pub struct OptionSetBuilder {
    raw: BTreeMap<RecordingOption, String>,
}

impl OptionSetBuilder {
    pub fn set(mut self, option: RecordingOption, value: impl Into<String>) -> Self {
        self.raw.insert(option, value.into());
        self
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.set(RecordingOption::Name, name)
    }

    /// How long data is kept, e.g. `"2 h"`. `"0"` means no limit.
    pub fn max_age(self, max_age: impl Into<String>) -> Self {
        self.set(RecordingOption::MaxAge, max_age)
    }

    /// Size cap in bytes. `"0"` means no limit.
    pub fn max_size(self, max_size: impl Into<String>) -> Self {
        self.set(RecordingOption::MaxSize, max_size)
    }

    pub fn dump_on_exit(self, dump_on_exit: impl Into<String>) -> Self {
        self.set(RecordingOption::DumpOnExit, dump_on_exit)
    }

    /// Path on the target where data is written when the recording ends.
    pub fn destination(self, destination: impl Into<String>) -> Self {
        self.set(RecordingOption::Destination, destination)
    }

    pub fn disk(self, disk: impl Into<String>) -> Self {
        self.set(RecordingOption::Disk, disk)
    }

    pub fn duration(self, duration: impl Into<String>) -> Self {
        self.set(RecordingOption::Duration, duration)
    }

    pub fn build(self) -> Result<OptionSet, RecorderError> {
        let mut options = BTreeMap::new();
        for option in RecordingOption::ALL {
            let value = match self.raw.get(&option) {
                Some(raw) => option.normalize(raw)?,
                None => option.default_value().to_string(),
            };
            if value != option.default_value() || option == RecordingOption::Disk {
                options.insert(option.key().to_string(), value);
            }
        }
        Ok(OptionSet { options })
    }
}

fn validate_time_span(option: RecordingOption, raw: &str) -> Result<String, RecorderError> {
    if raw.trim().is_empty() {
        return Ok(option.default_value().to_string());
    }
    let pattern = TIME_SPAN.as_ref().map_err(|e| {
        RecorderError::internal("compiling time span pattern", ProtocolFault::Defect(e.to_string()))
    })?;
    let bad_format = || RecorderError::Validation(format!("bad format: {option} = {raw:?}"));

    let captures = pattern.captures(raw).ok_or_else(bad_format)?;
    let value: i64 = captures[1].parse().map_err(|_| bad_format())?;
    if value < 0 {
        return Err(bad_format());
    }
    match &captures[2] {
        "" => Ok(value.to_string()),
        unit if TIME_UNITS.contains(&unit) => Ok(format!("{value} {unit}")),
        _ => Err(bad_format()),
    }
}

fn validate_size(raw: &str) -> Result<String, RecorderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(NO_LIMIT.to_string());
    }
    let value: i64 = trimmed
        .parse()
        .map_err(|e| RecorderError::Validation(format!("maxSize: {trimmed:?}: {e}")))?;
    if value < 0 {
        return Err(RecorderError::Validation(format!("maxSize: {value} < 0")));
    }
    Ok(value.to_string())
}

fn coerce_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_only_emit_disk() {
        let options = OptionSet::builder().build().unwrap();
        assert_eq!(options.as_map().len(), 1);
        assert_eq!(options.as_map().get("disk").map(String::as_str), Some("false"));
        assert_eq!(options, OptionSet::default());
    }

    #[test]
    fn explicit_defaults_are_omitted() {
        let options = OptionSet::builder()
            .name("")
            .max_age("0")
            .max_size("0")
            .dump_on_exit("false")
            .destination("   ")
            .duration("")
            .build()
            .unwrap();
        assert_eq!(options.as_map().keys().collect::<Vec<_>>(), vec!["disk"]);
    }

    #[test]
    fn non_defaults_are_emitted() {
        let options = OptionSet::builder()
            .name("  nightly  ")
            .max_age("2 h")
            .max_size("1048576")
            .dump_on_exit("TRUE")
            .destination("/tmp/out.jfr")
            .disk("true")
            .duration("30s")
            .build()
            .unwrap();

        assert_eq!(options.name(), "nightly");
        assert_eq!(options.max_age(), "2 h");
        assert_eq!(options.max_size(), "1048576");
        assert_eq!(options.dump_on_exit(), "true");
        assert_eq!(options.destination(), "/tmp/out.jfr");
        assert_eq!(options.disk(), "true");
        assert_eq!(options.duration(), "30 s");
        assert_eq!(options.as_map().len(), 7);
    }

    #[test]
    fn getters_fall_back_to_defaults() {
        let options = OptionSet::builder().build().unwrap();
        assert_eq!(options.name(), "");
        assert_eq!(options.max_age(), "0");
        assert_eq!(options.max_size(), "0");
        assert_eq!(options.dump_on_exit(), "false");
        assert_eq!(options.duration(), "0");
    }

    #[test]
    fn time_spans_accept_every_unit() {
        for unit in TIME_UNITS {
            let options = OptionSet::builder().duration(format!("5{unit}")).build().unwrap();
            assert_eq!(options.duration(), format!("5 {unit}"));
        }
    }

    #[test]
    fn bare_integer_time_span() {
        let options = OptionSet::builder().max_age("+15").build().unwrap();
        assert_eq!(options.max_age(), "15");
    }

    #[test]
    fn malformed_time_spans_are_rejected() {
        for bad in ["abc", "-1", "-5 s", "10 weeks", "1.5 s", "5 s extra", "99999999999999999999"] {
            let duration = OptionSet::builder().duration(bad).build();
            assert!(
                matches!(duration, Err(RecorderError::Validation(_))),
                "duration {bad:?} should fail"
            );
            let max_age = OptionSet::builder().max_age(bad).build();
            assert!(
                matches!(max_age, Err(RecorderError::Validation(_))),
                "maxAge {bad:?} should fail"
            );
        }
    }

    #[test]
    fn max_size_validation() {
        assert!(matches!(
            OptionSet::builder().max_size("-1").build(),
            Err(RecorderError::Validation(_))
        ));
        assert!(matches!(
            OptionSet::builder().max_size("ten").build(),
            Err(RecorderError::Validation(_))
        ));
        let options = OptionSet::builder().max_size(" 42 ").build().unwrap();
        assert_eq!(options.max_size(), "42");
    }

    #[test]
    fn booleans_coerce_anything_else_to_false() {
        let options = OptionSet::builder().disk("yes").dump_on_exit("1").build().unwrap();
        assert_eq!(options.disk(), "false");
        assert!(!options.as_map().contains_key("dumpOnExit"));
    }

    #[test]
    fn later_setter_wins() {
        let options = OptionSet::builder().name("first").name("second").build().unwrap();
        assert_eq!(options.name(), "second");
    }

    #[test]
    fn serializes_as_plain_map() {
        let options = OptionSet::builder().name("n").build().unwrap();
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(json, r#"{"disk":"false","name":"n"}"#);
    }

    /// `(raw input, normalized value)` pairs the builder must accept.
    fn valid_input(option: RecordingOption) -> BoxedStrategy<(String, String)> {
        match option {
            RecordingOption::Name | RecordingOption::Destination => "[ a-z0-9/._-]{0,12}"
                .prop_map(|raw| {
                    let normalized = raw.trim().to_string();
                    (raw, normalized)
                })
                .boxed(),
            RecordingOption::MaxAge | RecordingOption::Duration => (
                0i64..1_000_000,
                prop::sample::select(vec!["", "ns", "us", "ms", "s", "m", "h", "d"]),
                any::<bool>(),
            )
                .prop_map(|(n, unit, spaced)| {
                    let raw = if spaced { format!("{n} {unit}") } else { format!("{n}{unit}") };
                    let normalized = if unit.is_empty() { n.to_string() } else { format!("{n} {unit}") };
                    (raw, normalized)
                })
                .boxed(),
            RecordingOption::MaxSize => (0i64..i64::MAX).prop_map(|n| (n.to_string(), n.to_string())).boxed(),
            RecordingOption::DumpOnExit | RecordingOption::Disk => {
                prop::sample::select(vec!["true", "TRUE", "True", "false", "no", ""])
                    .prop_map(|raw| (raw.to_string(), raw.eq_ignore_ascii_case("true").to_string()))
                    .boxed()
            }
        }
    }

    fn builder_inputs() -> Vec<BoxedStrategy<(RecordingOption, Option<(String, String)>)>> {
        RecordingOption::ALL
            .iter()
            .map(|&option| {
                proptest::option::of(valid_input(option))
                    .prop_map(move |input| (option, input))
                    .boxed()
            })
            .collect()
    }

    proptest! {
        #[test]
        fn build_emits_exactly_the_non_default_keys(inputs in builder_inputs()) {
            let mut builder = OptionSet::builder();
            for (option, input) in &inputs {
                if let Some((raw, _)) = input {
                    builder = builder.set(*option, raw.clone());
                }
            }
            let options = builder.build().unwrap();

            for (option, input) in &inputs {
                let expected = input
                    .as_ref()
                    .map(|(_, normalized)| normalized.as_str())
                    .unwrap_or(option.default_value());
                prop_assert_eq!(options.get(*option), expected);
                prop_assert_eq!(
                    options.as_map().contains_key(option.key()),
                    expected != option.default_value() || *option == RecordingOption::Disk
                );
            }
        }

        #[test]
        fn any_malformed_time_span_is_rejected(
            raw in prop_oneof![
                "-[1-9][0-9]{0,5} ?[a-z]{0,2}",
                "[0-9]{1,6} ?[a-z]{3,6}",
                "[a-z]{1,6}",
            ]
        ) {
            for option in [RecordingOption::MaxAge, RecordingOption::Duration] {
                let result = OptionSet::builder().set(option, raw.clone()).build();
                prop_assert!(
                    matches!(result, Err(RecorderError::Validation(_))),
                    "{} = {:?}",
                    option,
                    raw
                );
            }
        }
    }
}
