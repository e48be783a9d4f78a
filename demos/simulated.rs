use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use goodwe_mppt_charger::{
    ChargerComponent, ChargerConfig, MpptPort, MqttPublisher, ParentDevice, RegisterKind,
    SchedulerOptions, StaticRegistry, scheduler,
};

/// Inverter with a slowly drifting string output; PV2 drops out now and then
struct SimulatedInverter {
    step: AtomicU64,
}

impl ParentDevice for SimulatedInverter {
    fn id(&self) -> &str {
        "batteryInverter0"
    }

    fn read_register(&self, address: u16, kind: RegisterKind) -> anyhow::Result<f64> {
        let step = self.step.fetch_add(1, Ordering::Relaxed);
        if address >= 35107 && step % 17 == 0 {
            anyhow::bail!("timeout reading register {address}");
        }
        let wave = ((step as f64) / 20.0).sin().abs();
        Ok(match kind {
            RegisterKind::Voltage => 280.0 + 40.0 * wave,
            RegisterKind::Current => 8.0 * wave,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        //        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = Arc::new(StaticRegistry::new());
    registry.register(Arc::new(SimulatedInverter {
        step: AtomicU64::new(1),
    }));

    let config = ChargerConfig::new("charger0", MpptPort::Mppt1, "batteryInverter0").with_alias("Roof");
    let charger = ChargerComponent::new(config, registry)?;
    let handle = scheduler::spawn(
        charger,
        SchedulerOptions {
            period: Duration::from_millis(500),
        },
    );

    // Publish to a broker if one is given, e.g. MQTT_HOST=192.168.11.1
    let publisher = match std::env::var("MQTT_HOST") {
        Ok(host) => {
            let publisher = Arc::new(MqttPublisher::connect("goodwe-charger", &host, 1883, "N/ems").await?);
            publisher.clone().forward(handle.subscribe());
            Some(publisher)
        }
        Err(_) => None,
    };

    let mut snapshots = handle.subscribe();
    for _ in 0..20 {
        snapshots.changed().await?;
        let snapshot = snapshots.borrow_and_update().clone();
        println!("{}", serde_json::to_string(&snapshot)?);
    }

    if let Some(publisher) = publisher {
        publisher.shutdown();
    }
    handle.shutdown().await;
    Ok(())
}
