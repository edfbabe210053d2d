//! `labctl`: drive the instruments listed in a bench configuration.
//!
//! ```bash
//! labctl list
//! labctl identify dmm
//! labctl measure dmm --function VOLT:DC --rate slow --range 10V --count 5 --json
//! labctl dac dac --channel 6 --millivolts 1000
//! labctl sweep --dmm meter --dac dac --channel 6 --stop 8000 --step 100 --output ch6.csv
//! ```

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use lab_instruments::config::{InstrumentDefinition, Settings, DEFAULT_CONFIG_PATH};
use lab_instruments::drivers::{self, DriverKind, SerialDac};
use lab_instruments::logging::{self, OutputFormat, TracingConfig};
use lab_instruments::{
    Function, InstrumentGuard, Multimeter, MultimeterSetup, Range, Rate, ResourceManager,
    TriggerSource,
};

#[derive(Parser)]
#[command(name = "labctl")]
#[command(about = "Control laboratory test instruments", long_about = None)]
struct Cli {
    /// Bench configuration file (TOML)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Compact)]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured instruments
    List,

    /// Print an instrument's *IDN? reply
    Identify {
        /// Instrument id from the configuration
        id: String,
    },

    /// Configure a multimeter and take readings
    Measure {
        /// Instrument id from the configuration
        id: String,
        #[arg(long, default_value = "VOLT:DC")]
        function: Function,
        #[arg(long, default_value = "slow")]
        rate: Rate,
        #[arg(long)]
        range: Range,
        #[arg(long, default_value = "internal")]
        trigger: TriggerSource,
        /// Number of readings
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Log every command sent
        #[arg(long)]
        echo: bool,
        /// One JSON object per reading
        #[arg(long)]
        json: bool,
    },

    /// Set one DAC channel
    Dac {
        /// DAC id from the configuration
        id: String,
        #[arg(long)]
        channel: u8,
        #[arg(long)]
        millivolts: u16,
    },

    /// Step a DAC channel and read a multimeter at each point, writing CSV
    Sweep {
        /// Multimeter id
        #[arg(long)]
        dmm: String,
        /// DAC id
        #[arg(long)]
        dac: String,
        #[arg(long)]
        channel: u8,
        /// First set point in millivolts
        #[arg(long, default_value_t = 0)]
        start: u16,
        /// Last set point in millivolts (inclusive)
        #[arg(long)]
        stop: u16,
        #[arg(long, default_value_t = 1)]
        step: u16,
        #[arg(long, default_value = "slow")]
        rate: Rate,
        #[arg(long, default_value = "10V")]
        range: Range,
        /// Wait after opening the DAC before the first set point
        #[arg(long, default_value_t = 1000)]
        settle_ms: u64,
        /// CSV file to write; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let tracing_config = TracingConfig::from_settings(&settings)
        .map_err(anyhow::Error::msg)?
        .with_format(cli.log_format);
    logging::init(tracing_config).map_err(anyhow::Error::msg)?;

    let manager = ResourceManager::system();

    match cli.command {
        Commands::List => list(&settings),
        Commands::Identify { id } => identify(&settings, &manager, &id),
        Commands::Measure {
            id,
            function,
            rate,
            range,
            trigger,
            count,
            echo,
            json,
        } => {
            let setup = MultimeterSetup {
                function,
                rate,
                range,
                trigger_source: trigger,
                echo,
            };
            measure(&settings, &manager, &id, &setup, count, json)
        }
        Commands::Dac {
            id,
            channel,
            millivolts,
        } => set_dac(&settings, &manager, &id, channel, millivolts),
        Commands::Sweep {
            dmm,
            dac,
            channel,
            start,
            stop,
            step,
            rate,
            range,
            settle_ms,
            output,
        } => {
            let setup = MultimeterSetup {
                function: Function::VoltageDc,
                rate,
                range,
                trigger_source: TriggerSource::Internal,
                echo: false,
            };
            let points = SweepPoints { start, stop, step };
            sweep(
                &settings,
                &manager,
                (dmm.as_str(), &setup),
                (dac.as_str(), channel),
                points,
                Duration::from_millis(settle_ms),
                output,
            )
        }
    }
}

fn definition<'a>(settings: &'a Settings, id: &str) -> Result<&'a InstrumentDefinition> {
    let Some(definition) = settings.find(id) else {
        bail!("No instrument '{id}' in the configuration");
    };
    if !definition.enabled {
        bail!("Instrument '{id}' is disabled in the configuration");
    }
    Ok(definition)
}

fn list(settings: &Settings) -> Result<()> {
    println!("{}", settings.application.name);
    for instrument in &settings.instruments {
        println!(
            "  {:<12} {:<10} {:<18} {}{}",
            instrument.id,
            instrument.driver,
            instrument.driver.capability(),
            instrument.resource,
            if instrument.enabled { "" } else { "  (disabled)" }
        );
    }
    Ok(())
}

fn identify(settings: &Settings, manager: &ResourceManager, id: &str) -> Result<()> {
    let definition = definition(settings, id)?;
    if !definition.driver.is_scpi() {
        bail!("'{id}' uses the {} driver, which has no identity query", definition.driver);
    }
    let session = drivers::open_scpi(
        definition.driver,
        manager,
        &definition.resource,
        definition.session_config(),
    )
    .with_context(|| format!("Failed to open '{}'", definition.resource))?;
    let identity = session.identity();
    session.close()?;
    println!("{}", identity?);
    Ok(())
}

fn open_multimeter(
    manager: &ResourceManager,
    definition: &InstrumentDefinition,
) -> Result<InstrumentGuard<Box<dyn Multimeter>>> {
    let meter = drivers::open_multimeter(
        definition.driver,
        manager,
        &definition.resource,
        definition.session_config(),
    )
    .with_context(|| format!("Failed to open multimeter '{}'", definition.id))?;
    Ok(InstrumentGuard::new(meter))
}

fn measure(
    settings: &Settings,
    manager: &ResourceManager,
    id: &str,
    setup: &MultimeterSetup,
    count: u32,
    as_json: bool,
) -> Result<()> {
    let definition = definition(settings, id)?;
    let mut meter = open_multimeter(manager, definition)?;
    meter.setup(setup).context("Multimeter setup failed")?;

    for index in 0..count {
        let value = meter.measure()?;
        if as_json {
            let record = json!({
                "instrument": id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "index": index,
                "function": setup.function.label(),
                "range": setup.range.label(),
                "value": value,
            });
            println!("{record}");
        } else {
            println!("{value}");
        }
    }

    meter.finish()?;
    Ok(())
}

fn open_dac(
    manager: &ResourceManager,
    definition: &InstrumentDefinition,
) -> Result<SerialDac> {
    if definition.driver != DriverKind::Dac {
        bail!("'{}' is not a DAC", definition.id);
    }
    let baud_rate = definition.session_config().baud_rate;
    SerialDac::open(manager, &definition.resource, baud_rate)
        .with_context(|| format!("Failed to open DAC '{}'", definition.id))
}

fn set_dac(
    settings: &Settings,
    manager: &ResourceManager,
    id: &str,
    channel: u8,
    millivolts: u16,
) -> Result<()> {
    let mut dac = open_dac(manager, definition(settings, id)?)?;
    let result = dac.set_volt(channel, millivolts);
    dac.close()?;
    result?;
    info!(dac = id, channel, millivolts, "DAC channel set");
    Ok(())
}

struct SweepPoints {
    start: u16,
    stop: u16,
    step: u16,
}

impl SweepPoints {
    fn iter(&self) -> Result<impl Iterator<Item = u16>> {
        if self.step == 0 {
            bail!("--step must be greater than zero");
        }
        if self.start > self.stop {
            bail!("--start {} is above --stop {}", self.start, self.stop);
        }
        Ok((self.start..=self.stop).step_by(usize::from(self.step)))
    }
}

fn sweep(
    settings: &Settings,
    manager: &ResourceManager,
    (dmm_id, setup): (&str, &MultimeterSetup),
    (dac_id, channel): (&str, u8),
    points: SweepPoints,
    settle: Duration,
    output: Option<PathBuf>,
) -> Result<()> {
    let points = points.iter()?;
    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create CSV file at {:?}", path))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);
    writer
        .write_record(["timestamp", "millivolts", "reading"])
        .context("Failed to write CSV header")?;

    let mut meter = open_multimeter(manager, definition(settings, dmm_id)?)?;
    meter.setup(setup).context("Multimeter setup failed")?;
    let mut dac = open_dac(manager, definition(settings, dac_id)?)?;
    std::thread::sleep(settle);

    let result = step_through(&mut dac, &mut meter, &mut writer, channel, points);

    dac.close()?;
    meter.finish()?;
    writer.flush().context("Failed to flush CSV writer")?;
    result
}

fn step_through(
    dac: &mut SerialDac,
    meter: &mut InstrumentGuard<Box<dyn Multimeter>>,
    writer: &mut csv::Writer<Box<dyn Write>>,
    channel: u8,
    points: impl Iterator<Item = u16>,
) -> Result<()> {
    for millivolts in points {
        dac.set_volt(channel, millivolts)?;
        let reading = meter.measure()?;
        writer
            .write_record(&[
                chrono::Utc::now().to_rfc3339(),
                millivolts.to_string(),
                reading.to_string(),
            ])
            .context("Failed to write sweep point")?;
    }
    Ok(())
}
