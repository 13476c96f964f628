//! Demo data seeder
//!
//! Writes a small synthetic plant into a sled database: a chiller, an air
//! handler and a rooftop unit with live readings, maintenance checks and
//! supplemental reports. The rooftop unit develops a bearing fault over its
//! final days so a diagnosis has something to find.
//!
//! # Usage
//! ```bash
//! ./seed-demo --db data/hvac_pdm.db --days 120
//! ./hvac-pdm --db data/hvac_pdm.db diagnose RTU-3
//! ```

use std::f64::consts::TAU;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use tracing::info;

use hvac_pdm::storage::SledStore;
use hvac_pdm::types::{
    Cadence, EquipmentInfo, MaintenanceCheck, Reading, ReadingSource, ReportKind, SupplementalReport,
};

#[derive(Parser, Debug)]
#[command(name = "seed-demo", about = "Seed a sled database with synthetic HVAC data")]
struct Args {
    /// sled database directory
    #[arg(long, default_value = "data/hvac_pdm.db")]
    db: String,

    /// Days of history to generate
    #[arg(long, default_value = "120", value_parser = clap::value_parser!(i64).range(7..=730))]
    days: i64,

    /// Hours between live readings
    #[arg(long, default_value = "6", value_parser = clap::value_parser!(i64).range(1..=24))]
    interval_hours: i64,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

/// One simulated sensor: seasonal mean, amplitude and noise.
struct SensorSpec {
    sensor_type: &'static str,
    unit: &'static str,
    mean: f64,
    seasonal_amplitude: f64,
    noise: Normal<f64>,
}

impl SensorSpec {
    fn new(sensor_type: &'static str, unit: &'static str, mean: f64, amplitude: f64, sd: f64) -> Result<Self> {
        Ok(Self {
            sensor_type,
            unit,
            mean,
            seasonal_amplitude: amplitude,
            noise: Normal::new(0.0, sd).context("invalid noise stddev")?,
        })
    }

    /// Peak in July, trough in January.
    fn sample(&self, ts: DateTime<Utc>, rng: &mut StdRng) -> f64 {
        let phase = (f64::from(ts.month0()) - 6.0) / 12.0 * TAU;
        self.mean + self.seasonal_amplitude * phase.cos() + self.noise.sample(rng)
    }
}

struct DemoAsset {
    info: EquipmentInfo,
    sensors: Vec<SensorSpec>,
    /// Check-form columns with their nominal values
    check_columns: Vec<(&'static str, f64)>,
    faulty: bool,
}

fn asset(
    id: &str,
    name: &str,
    equipment_type: &str,
    manufacturer: Option<&str>,
    model: Option<&str>,
    installed: (i32, u32, u32),
    condition_pct: f64,
) -> EquipmentInfo {
    EquipmentInfo {
        id: id.to_string(),
        name: name.to_string(),
        equipment_type: equipment_type.to_string(),
        manufacturer: manufacturer.map(str::to_string),
        model: model.map(str::to_string),
        location: Some("Building A Mechanical Room".to_string()),
        installed_on: NaiveDate::from_ymd_opt(installed.0, installed.1, installed.2),
        condition_pct: Some(condition_pct),
    }
}

fn demo_assets() -> Result<Vec<DemoAsset>> {
    Ok(vec![
        DemoAsset {
            info: asset("CH-1", "Chiller 1", "chiller", Some("Trane"), Some("CVHE"), (2009, 5, 1), 65.0),
            sensors: vec![
                SensorSpec::new("chilled_water_supply_temperature", "°F", 44.0, 0.8, 0.4)?,
                SensorSpec::new("condenser_approach", "°F", 3.5, 0.6, 0.3)?,
                SensorSpec::new("motor_current", "A", 28.0, 4.0, 1.2)?,
                SensorSpec::new("oil_pressure", "psi", 50.0, 0.0, 1.5)?,
            ],
            check_columns: vec![("evap_leaving_temp", 44.0), ("amp_draw", 28.0), ("oil_press", 50.0)],
            faulty: false,
        },
        DemoAsset {
            info: asset("AHU-1", "Air Handler 1", "ahu", Some("Carrier"), None, (2016, 9, 15), 80.0),
            sensors: vec![
                SensorSpec::new("supply_air_temperature", "°F", 55.0, 1.5, 0.6)?,
                SensorSpec::new("return_air_temperature", "°F", 73.0, 2.0, 0.8)?,
                SensorSpec::new("filter_pressure_drop", "inWC", 0.5, 0.0, 0.05)?,
                SensorSpec::new("vibration", "in/s", 0.08, 0.0, 0.01)?,
            ],
            check_columns: vec![("supply_air_temp", 55.0), ("filter_dp", 0.5), ("belt_tension", 1.0)],
            faulty: false,
        },
        DemoAsset {
            info: asset("RTU-3", "Rooftop Unit 3", "rtu", Some("Lennox"), None, (2012, 4, 1), 55.0),
            sensors: vec![
                SensorSpec::new("discharge_pressure", "psi", 260.0, 25.0, 6.0)?,
                SensorSpec::new("suction_pressure", "psi", 120.0, 6.0, 2.5)?,
                SensorSpec::new("motor_current", "A", 22.0, 3.0, 0.8)?,
                SensorSpec::new("vibration", "in/s", 0.09, 0.0, 0.01)?,
            ],
            check_columns: vec![("discharge_pressure", 260.0), ("suction_pressure", 120.0), ("vibration_ips", 0.09)],
            faulty: true,
        },
    ])
}

/// Extra vibration for the faulty unit over its final `FAULT_DAYS`.
const FAULT_DAYS: i64 = 5;

fn fault_offset(asset: &DemoAsset, sensor_type: &str, ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    if !asset.faulty || sensor_type != "vibration" {
        return 0.0;
    }
    let hours_into_fault = (ts - (now - Duration::days(FAULT_DAYS))).num_hours();
    if hours_into_fault <= 0 {
        0.0
    } else {
        // Ramps to +0.45 in/s
        0.45 * (hours_into_fault as f64 / (FAULT_DAYS * 24) as f64).min(1.0)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let store = SledStore::open(&args.db).with_context(|| format!("opening {}", args.db))?;
    let now = Utc::now();
    let start = now - Duration::days(args.days);

    for demo in demo_assets()? {
        let id = demo.info.id.clone();
        store.put_equipment(&demo.info)?;

        let mut readings = 0usize;
        let mut ts = start;
        while ts <= now {
            for spec in &demo.sensors {
                let value = spec.sample(ts, &mut rng) + fault_offset(&demo, spec.sensor_type, ts, now);
                store.insert_reading(&Reading::new(&id, spec.sensor_type, value.max(0.0), spec.unit, ts, ReadingSource::LiveSensor))?;
                readings += 1;
            }
            ts += Duration::hours(args.interval_hours);
        }

        let mut checks = 0usize;
        for day in 0..args.days {
            let round_start = start + Duration::days(day) + Duration::hours(8);
            let mut cadences = vec![Cadence::Daily];
            if day % 7 == 0 {
                cadences.push(Cadence::Weekly);
            }
            if day % 30 == 0 {
                cadences.push(Cadence::Monthly);
            }
            // Technicians skip the odd daily round
            if rng.gen_bool(0.15) {
                cadences.retain(|c| *c != Cadence::Daily);
            }
            for (slot, cadence) in cadences.into_iter().enumerate() {
                // Rounds on the same day are taken an hour apart
                let performed_at = round_start + Duration::hours(slot as i64);
                let measurements = demo
                    .check_columns
                    .iter()
                    .map(|(col, nominal)| {
                        let jitter = 1.0 + rng.gen_range(-0.03..0.03);
                        (col.to_string(), nominal * jitter)
                    })
                    .collect();
                store.insert_check(&MaintenanceCheck {
                    id: format!("{id}-{cadence}-{day}"),
                    equipment_id: id.clone(),
                    cadence,
                    performed_at,
                    technician: Some(["J. Ortiz", "M. Chen", "R. Patel"][rng.gen_range(0..3usize)].to_string()),
                    measurements,
                    notes: None,
                })?;
                checks += 1;
            }
        }

        let kinds = [ReportKind::Refrigerant, ReportKind::Vibration, ReportKind::Condenser];
        for (n, kind) in kinds.iter().enumerate() {
            let recorded_at = now - Duration::days(rng.gen_range(1..args.days.max(2)));
            store.insert_report(&SupplementalReport {
                id: format!("{id}-{kind}-{n}"),
                equipment_id: id.clone(),
                kind: *kind,
                recorded_at,
                summary: format!("Routine {kind} survey"),
            })?;
        }

        info!(equipment_id = %id, readings, checks, reports = kinds.len(), "Seeded equipment");
    }

    store.flush()?;
    info!(db = %args.db, days = args.days, "Demo data written");
    Ok(())
}
