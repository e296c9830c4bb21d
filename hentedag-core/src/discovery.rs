//! Fallback-chain resolution of a free-text address to a provider binding.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::model::{AddressBinding, AddressQuery, ProviderId};
use crate::plugin::ProviderRegistry;
use crate::ports::PortError;

/// Sink for the human-readable progress lines shown while discovery walks
/// the provider chain.
pub trait ProgressSink: Send + Sync {
    /// Report one progress line, e.g. “Sjekker Bjørnavegen 72B hos BIR…”.
    fn progress(&self, message: &str);
}

/// Progress sink that discards every message, for headless discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn progress(&self, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of one discovery run over the provider chain.
pub enum DiscoveryOutcome {
    /// A provider recognized the address.
    Found(AddressBinding),
    /// Every provider was probed exactly once and none matched.
    Exhausted {
        /// Providers probed, in the order they were tried.
        tried: Vec<ProviderId>,
    },
    /// The free-text address could not be split into street and number.
    InvalidAddress,
}

/// Probe the registry's providers in priority order until one recognizes
/// the address.
///
/// Probe errors are logged and advance the chain; they never abort the run.
/// When a cadastre is given, municipality number and street code are
/// resolved first so code-based providers can participate.
pub async fn discover(
    registry: &ProviderRegistry,
    cadastre: Option<&CadastreLookup>,
    address: &str,
    progress: &dyn ProgressSink,
) -> DiscoveryOutcome {
    let Some(mut query) = AddressQuery::parse(address) else {
        warn!(address, "address has no parsable house number");
        return DiscoveryOutcome::InvalidAddress;
    };
    if let Some(cadastre) = cadastre {
        cadastre.annotate(&mut query).await;
    }

    let mut tried = Vec::with_capacity(registry.len());
    for plugin in registry.iter() {
        progress.progress(&format!(
            "Sjekker {} hos {}…",
            query.full_address(),
            plugin.meta.name
        ));
        tried.push(plugin.meta.id);
        match plugin.probe.probe(&query).await {
            Ok(Some(matched)) => {
                info!(
                    provider = %plugin.meta.name,
                    address = %query.full_address(),
                    "address recognized"
                );
                return DiscoveryOutcome::Found(AddressBinding {
                    raw_address: address.trim().to_owned(),
                    provider: plugin.meta.id,
                    address_id: matched.address_id,
                    county_id: query.county_id.clone(),
                    street_code: query.street_code.clone(),
                });
            }
            Ok(None) => {
                debug!(provider = %plugin.meta.name, "address not served, trying next");
            }
            Err(error) => {
                warn!(
                    provider = %plugin.meta.name,
                    error = %error,
                    "probe failed, trying next"
                );
            }
        }
    }
    info!(probed = tried.len(), "no provider recognized the address");
    DiscoveryOutcome::Exhausted { tried }
}

const CADASTRE_URL: &str = "https://ws.geonorge.no/adresser/v1/sok";

/// Lookup of municipality number and street code in Kartverket's open
/// address register.
pub struct CadastreLookup {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CadastreResponse {
    #[serde(default)]
    adresser: Vec<CadastreHit>,
}

#[derive(Debug, Deserialize)]
struct CadastreHit {
    kommunenummer: Option<String>,
    adressekode: Option<i64>,
}

impl CadastreLookup {
    /// Create a lookup using the shared HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fill municipality number and street code into `query` when missing.
    ///
    /// The cadastre is an auxiliary source: failures are logged and leave
    /// the query untouched so discovery can continue with the providers
    /// that need no codes.
    pub async fn annotate(&self, query: &mut AddressQuery) {
        if query.county_id.is_some() && query.street_code.is_some() {
            return;
        }
        match self.first_hit(query).await {
            Ok(Some(hit)) => {
                if query.county_id.is_none() {
                    query.county_id = hit.kommunenummer;
                }
                if query.street_code.is_none() {
                    query.street_code = hit.adressekode.map(|code| code.to_string());
                }
                debug!(address = %query.full_address(), "cadastre codes resolved");
            }
            Ok(None) => {
                debug!(address = %query.full_address(), "address not in cadastre");
            }
            Err(error) => {
                warn!(error = %error, "cadastre lookup failed");
            }
        }
    }

    async fn first_hit(&self, query: &AddressQuery) -> Result<Option<CadastreHit>, PortError> {
        let response: CadastreResponse = self
            .client
            .get(CADASTRE_URL)
            .query(&[
                ("sok", query.full_address().as_str()),
                ("treffPerSide", "10"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.adresser.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{discover, DiscoveryOutcome, ProgressSink, SilentProgress};
    use crate::model::{AddressBinding, AddressQuery, ProviderId, ProviderMeta, RawCalendar};
    use crate::plugin::{ProviderPlugin, ProviderRegistry};
    use crate::ports::{AddressProbe, CalendarPort, PortError, ProbeMatch};

    #[derive(Clone, Copy)]
    enum Behavior {
        Match,
        NoMatch,
        Fail,
    }

    struct StubProbe {
        meta: ProviderMeta,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AddressProbe for StubProbe {
        fn meta(&self) -> &ProviderMeta {
            &self.meta
        }

        async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Match => Ok(Some(ProbeMatch {
                    address_id: query.full_address(),
                })),
                Behavior::NoMatch => Ok(None),
                Behavior::Fail => Err(PortError::AddressNotFound),
            }
        }
    }

    struct StubCalendar {
        meta: ProviderMeta,
    }

    #[async_trait]
    impl CalendarPort for StubCalendar {
        fn meta(&self) -> &ProviderMeta {
            &self.meta
        }

        async fn calendar(&self, _binding: &AddressBinding) -> Result<RawCalendar, PortError> {
            Ok(RawCalendar::new())
        }
    }

    struct Recorder(Mutex<Vec<String>>);

    impl ProgressSink for Recorder {
        fn progress(&self, message: &str) {
            self.0.lock().expect("progress lock").push(message.to_owned());
        }
    }

    fn stub_plugin(id: ProviderId, behavior: Behavior) -> (ProviderPlugin, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let plugin = ProviderPlugin {
            meta: ProviderMeta::new(id),
            probe: Arc::new(StubProbe {
                meta: ProviderMeta::new(id),
                behavior,
                calls: Arc::clone(&calls),
            }),
            calendar: Arc::new(StubCalendar {
                meta: ProviderMeta::new(id),
            }),
        };
        (plugin, calls)
    }

    #[tokio::test]
    async fn exhaustion_probes_every_provider_exactly_once() {
        let (first, first_calls) = stub_plugin(ProviderId::MinRenovasjon, Behavior::NoMatch);
        let (second, second_calls) = stub_plugin(ProviderId::Bir, Behavior::Fail);
        let (third, third_calls) = stub_plugin(ProviderId::Oslo, Behavior::NoMatch);
        let registry = ProviderRegistry::new(vec![first, second, third]);

        let outcome = discover(&registry, None, "Bjørnavegen 72B", &SilentProgress).await;

        assert_eq!(
            outcome,
            DiscoveryOutcome::Exhausted {
                tried: vec![ProviderId::MinRenovasjon, ProviderId::Bir, ProviderId::Oslo],
            }
        );
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_match_stops_the_chain() {
        let (first, _) = stub_plugin(ProviderId::MinRenovasjon, Behavior::NoMatch);
        let (second, _) = stub_plugin(ProviderId::ReMidt, Behavior::Match);
        let (third, third_calls) = stub_plugin(ProviderId::Oslo, Behavior::Match);
        let registry = ProviderRegistry::new(vec![first, second, third]);

        let outcome = discover(&registry, None, "Aasmund Vinjes vei 39", &SilentProgress).await;

        let DiscoveryOutcome::Found(binding) = outcome else {
            panic!("expected a binding, got {outcome:?}");
        };
        assert_eq!(binding.provider, ProviderId::ReMidt);
        assert_eq!(binding.address_id, "Aasmund Vinjes vei 39");
        assert_eq!(binding.raw_address, "Aasmund Vinjes vei 39");
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn probe_errors_advance_to_the_next_provider() {
        let (first, _) = stub_plugin(ProviderId::MinRenovasjon, Behavior::Fail);
        let (second, _) = stub_plugin(ProviderId::Bir, Behavior::Match);
        let registry = ProviderRegistry::new(vec![first, second]);

        let outcome = discover(&registry, None, "Markveien 35B", &SilentProgress).await;

        let DiscoveryOutcome::Found(binding) = outcome else {
            panic!("expected a binding, got {outcome:?}");
        };
        assert_eq!(binding.provider, ProviderId::Bir);
    }

    #[tokio::test]
    async fn unparsable_address_short_circuits() {
        let (first, first_calls) = stub_plugin(ProviderId::MinRenovasjon, Behavior::Match);
        let registry = ProviderRegistry::new(vec![first]);

        let outcome = discover(&registry, None, "Bjørnavegen", &SilentProgress).await;

        assert_eq!(outcome, DiscoveryOutcome::InvalidAddress);
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn progress_reports_one_line_per_probe() {
        let (first, _) = stub_plugin(ProviderId::MinRenovasjon, Behavior::NoMatch);
        let (second, _) = stub_plugin(ProviderId::Glor, Behavior::NoMatch);
        let registry = ProviderRegistry::new(vec![first, second]);
        let recorder = Recorder(Mutex::new(Vec::new()));

        let _outcome = discover(&registry, None, "Bjørnavegen 72B", &recorder).await;

        let messages = recorder.0.lock().expect("progress lock");
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages.first().map(String::as_str),
            Some("Sjekker Bjørnavegen 72B hos Min Renovasjon…")
        );
        assert!(messages.get(1).is_some_and(|line| line.contains("Glør")));
    }
}
