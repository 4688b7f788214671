use crate::bus::bitbang::TwoWire;
use crate::bus::I2cTransport;
use crate::config::hub_config::HubConfig;
use crate::errors::{BusResult, SensorError};
use crate::sensors::aht10::Aht10;
use crate::sensors::bmp180::Bmp180;
use crate::sensors::hx711::{ChannelGain, Hx711, WeightParams};
use crate::sensors::pca9548::Pca9548;
use crate::sensors::veml7700::Veml7700;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// The barometer and the light sensor sit together on the first sub-bus;
// temperature/humidity unit i sits on channel i.
const SHARED_CHANNEL: u8 = 0;

/// One logical temperature/humidity position: mux channel plus the
/// driver, absent when initialization failed.
struct TempHumidSlot {
    channel: u8,
    driver: Option<Aht10>,
}

/// Owns the bus handle and one driver instance per physical device,
/// sequences every multiplexed access, and degrades per-device: a
/// failing sensor reads as `None`, never as a fabricated number.
pub struct SensorHub {
    bus: Box<dyn I2cTransport>,
    mux: Pca9548,
    bmp: Option<Bmp180>,
    veml: Option<Veml7700>,
    slots: Vec<TempHumidSlot>,
    weight: Option<Hx711>,
    weight_cycles: u32,
    init_issues: Vec<String>,
}

impl SensorHub {
    /// Best-effort construction: each device initializes independently,
    /// and a failure marks that device absent with one human-readable
    /// entry in `init_issues` instead of aborting the rest.
    pub async fn init(
        mut bus: Box<dyn I2cTransport>,
        weight_pins: Option<BusResult<Box<dyn TwoWire>>>,
        config: &HubConfig,
    ) -> Self {
        let mut init_issues = Vec::new();
        let mux = Pca9548::new(config.hub.mux_address);

        match mux.select(bus.as_mut(), SHARED_CHANNEL).await {
            Ok(()) => {
                if let Ok(state) = mux.get_state(bus.as_mut()).await {
                    debug!("[hub] mux reports channel mask {:#04x}", state);
                }
            }
            Err(e) => init_issues.push(format!("Could not init i2c switch: {}", e)),
        }

        let bmp = if config.hub.bmp180 {
            let result = async {
                let mut bmp = Bmp180::new(config.barometer.address, config.barometer.oversampling)?;
                mux.select(bus.as_mut(), SHARED_CHANNEL).await?;
                bmp.configure(bus.as_mut()).await?;
                Ok::<_, SensorError>(bmp)
            }
            .await;
            match result {
                Ok(bmp) => Some(bmp),
                Err(e) => {
                    init_issues.push(format!("Failed to initialize bmp180 barometer: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let veml = if config.hub.veml7700 {
            let result = async {
                let mut veml = Veml7700::new(config.light.address);
                mux.select(bus.as_mut(), SHARED_CHANNEL).await?;
                veml.configure(bus.as_mut(), config.light.int_time_ms, config.light.gain)
                    .await?;
                Ok::<_, SensorError>(veml)
            }
            .await;
            match result {
                Ok(veml) => Some(veml),
                Err(e) => {
                    init_issues.push(format!(
                        "Failed to initialize veml7700 ambient light sensor: {}",
                        e
                    ));
                    None
                }
            }
        } else {
            None
        };

        let mut slots = Vec::with_capacity(config.hub.aht10_count as usize);
        for i in 0..config.hub.aht10_count {
            let result = async {
                let mut aht = Aht10::new(config.hub.aht10_address, config.hub.aht10_offset);
                mux.select(bus.as_mut(), i).await?;
                aht.configure(bus.as_mut()).await?;
                Ok::<_, SensorError>(aht)
            }
            .await;
            let driver = match result {
                Ok(aht) => Some(aht),
                Err(e) => {
                    init_issues.push(format!(
                        "Failed to initialize aht10-{} temperature/humidity sensor: {}",
                        i, e
                    ));
                    None
                }
            };
            slots.push(TempHumidSlot { channel: i, driver });
        }

        let mut weight_cycles = 8;
        let weight = match (&config.weight, weight_pins) {
            (Some(section), Some(Ok(pins))) => {
                weight_cycles = section.cycles;
                let mut hx = Hx711::new(
                    pins,
                    WeightParams {
                        scale: section.scale,
                        offset: section.offset,
                        tare: section.tare,
                    },
                );
                match hx.configure(ChannelGain::A128).await {
                    Ok(()) => Some(hx),
                    Err(e) => {
                        init_issues.push(format!("Failed to initialize hx711 weight sensor: {}", e));
                        None
                    }
                }
            }
            (Some(_), Some(Err(e))) => {
                init_issues.push(format!("Failed to initialize hx711 weight sensor: {}", e));
                None
            }
            _ => None,
        };

        info!(
            "[hub] initialized: bmp180={} veml7700={} aht10={}/{} hx711={}",
            bmp.is_some(),
            veml.is_some(),
            slots.iter().filter(|s| s.driver.is_some()).count(),
            slots.len(),
            weight.is_some()
        );

        Self {
            bus,
            mux,
            bmp,
            veml,
            slots,
            weight,
            weight_cycles,
            init_issues,
        }
    }

    /// One entry per device that failed to initialize.
    pub fn init_issues(&self) -> &[String] {
        &self.init_issues
    }

    /// Ambient light in lux.
    pub async fn read_lux(&mut self) -> Option<f64> {
        let veml = self.veml.as_mut()?;
        let bus = self.bus.as_mut();
        let mux = &self.mux;
        let result = async {
            mux.select(&mut *bus, SHARED_CHANNEL).await?;
            veml.lux(&mut *bus, true).await
        }
        .await;
        match result {
            Ok(lux) => Some(lux),
            Err(e) => {
                warn!("[hub] lux read failed: {}", e);
                None
            }
        }
    }

    /// Weight in kg. The weight cell has dedicated pins, so no mux
    /// selection is involved.
    pub async fn read_weight(&mut self) -> Option<f64> {
        let weight = self.weight.as_mut()?;
        match weight.weight(self.weight_cycles).await {
            Ok(kg) => Some(kg),
            Err(e) => {
                warn!("[hub] weight read failed: {}", e);
                None
            }
        }
    }

    /// Barometer temperature (degree C) and pressure (kPa). The
    /// temperature conversion runs first on the same sample; it
    /// establishes the term the pressure conversion consumes.
    pub async fn read_temp_pressure(&mut self) -> (Option<f64>, Option<f64>) {
        let Some(bmp) = self.bmp.as_mut() else {
            return (None, None);
        };
        let bus = self.bus.as_mut();
        let mux = &self.mux;
        let result = async {
            mux.select(&mut *bus, SHARED_CHANNEL).await?;
            let temp = bmp.temperature(&mut *bus, true).await?;
            let pressure = bmp.pressure(&mut *bus, false).await?;
            Ok::<_, SensorError>((temp, pressure))
        }
        .await;
        match result {
            Ok((temp, pressure)) => (Some(temp), Some(pressure / 1000.0)),
            Err(e) => {
                warn!("[hub] barometer read failed: {}", e);
                (None, None)
            }
        }
    }

    /// Temperature/humidity for one logical unit; out-of-range or
    /// absent slots read as `(None, None)`.
    pub async fn read_temp_humid(&mut self, idx: usize) -> (Option<f64>, Option<f64>) {
        let Some(slot) = self.slots.get_mut(idx) else {
            return (None, None);
        };
        let channel = slot.channel;
        let Some(aht) = slot.driver.as_mut() else {
            return (None, None);
        };
        let bus = self.bus.as_mut();
        let mux = &self.mux;
        let result = async {
            mux.select(&mut *bus, channel).await?;
            aht.both(&mut *bus, true).await
        }
        .await;
        match result {
            Ok((temp, humid)) => (Some(temp), Some(humid)),
            Err(e) => {
                warn!("[hub] aht10-{} read failed: {}", idx, e);
                (None, None)
            }
        }
    }

    pub async fn read_all_temp_humid(&mut self) -> Vec<(Option<f64>, Option<f64>)> {
        let mut results = Vec::with_capacity(self.slots.len());
        for i in 0..self.slots.len() {
            results.push(self.read_temp_humid(i).await);
        }
        results
    }

    /// Flat best-effort report; one failing sensor never takes down the
    /// rest.
    pub async fn report(&mut self) -> BTreeMap<String, Option<f64>> {
        let mut report = BTreeMap::new();

        report.insert("ambient_lux".to_string(), self.read_lux().await);

        let (temp, pressure) = self.read_temp_pressure().await;
        // Altitude comes from the sample just read; skipped when the
        // pressure read itself failed. Note the driver-level 0.0
        // sentinel still applies inside `altitude`.
        let altitude = if pressure.is_some() {
            match self.bmp.as_mut() {
                Some(bmp) => Some(bmp.altitude(self.bus.as_mut(), false).await),
                None => None,
            }
        } else {
            None
        };
        report.insert("ext_temperature".to_string(), temp);
        report.insert("ext_pressure".to_string(), pressure);
        report.insert("ext_altitude".to_string(), altitude);

        for (i, (temp, humid)) in self.read_all_temp_humid().await.into_iter().enumerate() {
            report.insert(format!("temperature_{}", i), temp);
            report.insert(format!("humidity_{}", i), humid);
        }

        report.insert("weight".to_string(), self.read_weight().await);
        report
    }
}

/// Unit string for a report key.
pub fn report_unit(key: &str) -> &'static str {
    if key.contains("temperature") {
        "C"
    } else if key.contains("pressure") {
        "kPa"
    } else if key.contains("altitude") {
        "m"
    } else if key.contains("humidity") {
        "%"
    } else if key.contains("weight") {
        "kg"
    } else {
        ""
    }
}
