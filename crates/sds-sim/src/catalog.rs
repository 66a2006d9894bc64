//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::fs;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::errors::{Result, SimError};

/// Machine assigned to identities without a `machine:` prefix.
pub const UNKNOWN_MACHINE: &str = "UNKNOWN";
pub const IDENTITY_COLUMN: &str = "machineName:sensorName";
pub const HIGH_COLUMN: &str = "operationalHigh";
pub const LOW_COLUMN: &str = "operationalLow";

/// Operational limits of one sensor. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSpec {
    /// `machine:sensor` identity, unique within a catalog.
    pub identity: String,
    pub machine: String,
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl SensorSpec {
    pub fn new(identity: impl Into<String>, low: f64, high: f64) -> Self {
        let identity = identity.into();
        let (machine, name) = split_identity(&identity);
        let (machine, name) = (machine.to_owned(), name.to_owned());
        Self {
            identity,
            machine,
            name,
            low,
            high,
        }
    }

    /// `high - low`; zero or negative for degenerate ranges.
    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    /// Two-state sensors report `0`/`1` rather than a decimal.
    pub fn is_binary(&self) -> bool {
        self.low == 0.0 && self.high == 1.0
    }
}

/// Split on the first `:` into `(machine, sensor)`.
pub fn split_identity(identity: &str) -> (&str, &str) {
    match identity.split_once(':') {
        Some((machine, sensor)) => (machine, sensor),
        None => (UNKNOWN_MACHINE, identity),
    }
}

/// Sensor limits keyed by identity plus the machine → sensors index, both in source order.
#[derive(Debug, Clone, Default)]
pub struct LimitCatalog {
    sensors: IndexMap<String, SensorSpec>,
    machines: IndexMap<String, Vec<String>>,
}

impl LimitCatalog {
    /// Load a limits CSV from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|source| SimError::LimitsUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            sensors = catalog.len(),
            machines = catalog.machine_count(),
            "limit catalog loaded"
        );
        for (machine, sensors) in &catalog.machines {
            info!(machine = %machine, sensors = sensors.len(), "machine sensors");
        }
        Ok(catalog)
    }

    /// Parse CSV with the `machineName:sensorName`, `operationalHigh` and
    /// `operationalLow` header columns. Other columns are ignored.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let identity_idx = column(&headers, IDENTITY_COLUMN)?;
        let high_idx = column(&headers, HIGH_COLUMN)?;
        let low_idx = column(&headers, LOW_COLUMN)?;

        let mut specs = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            let identity = record.get(identity_idx).unwrap_or_default();
            if identity.is_empty() {
                return Err(SimError::MalformedLimits {
                    line,
                    reason: format!("missing `{}`", IDENTITY_COLUMN),
                });
            }
            let high = bound(&record, high_idx, HIGH_COLUMN, identity, line)?;
            let low = bound(&record, low_idx, LOW_COLUMN, identity, line)?;
            specs.push((line, SensorSpec::new(identity, low, high)));
        }
        Self::build(specs)
    }

    /// Build a catalog from already-parsed specs, rejecting duplicate identities.
    pub fn from_specs(specs: impl IntoIterator<Item = SensorSpec>) -> Result<Self> {
        Self::build(
            specs
                .into_iter()
                .enumerate()
                .map(|(idx, spec)| (idx as u64 + 1, spec)),
        )
    }

    fn build(specs: impl IntoIterator<Item = (u64, SensorSpec)>) -> Result<Self> {
        let mut catalog = Self::default();
        for (line, spec) in specs {
            if !spec.low.is_finite() || !spec.high.is_finite() {
                return Err(SimError::MalformedLimits {
                    line,
                    reason: format!("limits of {} are not finite", spec.identity),
                });
            }
            match catalog.sensors.entry(spec.identity.clone()) {
                Entry::Occupied(_) => {
                    return Err(SimError::MalformedLimits {
                        line,
                        reason: format!("duplicate sensor {}", spec.identity),
                    });
                }
                Entry::Vacant(slot) => {
                    catalog
                        .machines
                        .entry(spec.machine.clone())
                        .or_default()
                        .push(spec.identity.clone());
                    slot.insert(spec);
                }
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, identity: &str) -> Option<&SensorSpec> {
        self.sensors.get(identity)
    }

    pub fn sensors(&self) -> impl Iterator<Item = &SensorSpec> {
        self.sensors.values()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn machines(&self) -> impl Iterator<Item = &str> {
        self.machines.keys().map(String::as_str)
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    /// Machine at `index` in source order.
    pub fn machine_at(&self, index: usize) -> Option<&str> {
        self.machines.get_index(index).map(|(name, _)| name.as_str())
    }

    /// Sensor identities owned by `machine`; empty for unknown machines.
    pub fn machine_sensors(&self, machine: &str) -> &[String] {
        self.machines
            .get(machine)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| SimError::MalformedLimits {
            line: 1,
            reason: format!("missing column `{}`", name),
        })
}

fn bound(record: &StringRecord, idx: usize, field: &str, identity: &str, line: u64) -> Result<f64> {
    let raw = record.get(idx).unwrap_or_default();
    let value = raw.parse::<f64>().map_err(|_| SimError::MalformedLimits {
        line,
        reason: format!("{} of {} is not a number: {:?}", field, identity, raw),
    })?;
    if !value.is_finite() {
        return Err(SimError::MalformedLimits {
            line,
            reason: format!("{} of {} is not finite: {:?}", field, identity, raw),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LIMITS: &str = "\
machineName:sensorName,operationalHigh,operationalLow
PUMP1:TEMP,100,0
PUMP1:PRESSURE,6.5,1.5
VALVE1:STATE,1,0
AMBIENT,40,-10
";

    #[test]
    fn loads_specs_and_machine_groups_in_order() {
        let catalog = LimitCatalog::from_reader(LIMITS.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.machines().collect::<Vec<_>>(),
            vec!["PUMP1", "VALVE1", UNKNOWN_MACHINE]
        );
        assert_eq!(catalog.machine_sensors("PUMP1"), ["PUMP1:TEMP", "PUMP1:PRESSURE"]);
        let pressure = catalog.get("PUMP1:PRESSURE").unwrap();
        assert_eq!(pressure.machine, "PUMP1");
        assert_eq!(pressure.name, "PRESSURE");
        assert_eq!((pressure.low, pressure.high), (1.5, 6.5));
    }

    #[test]
    fn identity_without_colon_is_unknown_machine() {
        let catalog = LimitCatalog::from_reader(LIMITS.as_bytes()).unwrap();
        let ambient = catalog.get("AMBIENT").unwrap();
        assert_eq!(ambient.machine, UNKNOWN_MACHINE);
        assert_eq!(ambient.name, "AMBIENT");
    }

    #[test]
    fn splits_on_first_colon_only() {
        let spec = SensorSpec::new("LINE2:MOTOR:RPM", 0.0, 3000.0);
        assert_eq!(spec.machine, "LINE2");
        assert_eq!(spec.name, "MOTOR:RPM");
    }

    #[test]
    fn columns_may_be_reordered_and_padded() {
        let csv = "operationalLow, operationalHigh ,notes,machineName:sensorName\n0, 10 ,x,M:S\n";
        let catalog = LimitCatalog::from_reader(csv.as_bytes()).unwrap();
        let spec = catalog.get("M:S").unwrap();
        assert_eq!((spec.low, spec.high), (0.0, 10.0));
    }

    #[test]
    fn non_numeric_bound_is_malformed() {
        let csv = "machineName:sensorName,operationalHigh,operationalLow\nPUMP1:TEMP,hot,0\n";
        let err = LimitCatalog::from_reader(csv.as_bytes()).unwrap_err();
        match err {
            SimError::MalformedLimits { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("operationalHigh"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_finite_bounds_are_malformed() {
        for row in ["PUMP1:TEMP,100,nan", "PUMP1:TEMP,inf,inf", "PUMP1:TEMP,100,-inf"] {
            let csv = format!("machineName:sensorName,operationalHigh,operationalLow\n{row}\n");
            match LimitCatalog::from_reader(csv.as_bytes()) {
                Err(SimError::MalformedLimits { line, reason }) => {
                    assert_eq!(line, 2);
                    assert!(reason.contains("not finite"), "{reason}");
                }
                other => panic!("{row} loaded: {other:?}"),
            }
        }
        assert!(matches!(
            LimitCatalog::from_specs([SensorSpec::new("M:S", f64::NAN, 1.0)]),
            Err(SimError::MalformedLimits { line: 1, .. })
        ));
    }

    #[test]
    fn empty_bound_is_malformed() {
        let csv = "machineName:sensorName,operationalHigh,operationalLow\nPUMP1:TEMP,100,\n";
        assert!(matches!(
            LimitCatalog::from_reader(csv.as_bytes()),
            Err(SimError::MalformedLimits { .. })
        ));
    }

    #[test]
    fn missing_identity_is_malformed() {
        let csv = "machineName:sensorName,operationalHigh,operationalLow\n,100,0\n";
        assert!(matches!(
            LimitCatalog::from_reader(csv.as_bytes()),
            Err(SimError::MalformedLimits { .. })
        ));
    }

    #[test]
    fn missing_column_is_malformed() {
        let csv = "machineName:sensorName,operationalHigh\nPUMP1:TEMP,100\n";
        let err = LimitCatalog::from_reader(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("operationalLow"));
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let csv = "machineName:sensorName,operationalHigh,operationalLow\nA:B,1,0\nA:B,2,0\n";
        assert!(matches!(
            LimitCatalog::from_reader(csv.as_bytes()),
            Err(SimError::MalformedLimits { line: 3, .. })
        ));
    }

    #[test]
    fn degenerate_ranges_are_accepted() {
        let catalog = LimitCatalog::from_specs([
            SensorSpec::new("M:FLAT", 5.0, 5.0),
            SensorSpec::new("M:INVERTED", 10.0, 2.0),
        ])
        .unwrap();
        assert_eq!(catalog.get("M:FLAT").unwrap().span(), 0.0);
        assert!(catalog.get("M:INVERTED").unwrap().span() < 0.0);
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = LimitCatalog::from_path(Path::new("/nonexistent/limits.csv")).unwrap_err();
        assert!(matches!(err, SimError::LimitsUnreadable { .. }));
    }

    #[test]
    fn from_path_reads_file() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(LIMITS.as_bytes())?;
        file.flush()?;
        let catalog = LimitCatalog::from_path(file.path())?;
        assert_eq!(catalog.machine_count(), 3);
        assert_eq!(catalog.machine_at(1), Some("VALVE1"));
        assert!(catalog.get("VALVE1:STATE").unwrap().is_binary());
        Ok(())
    }
}
