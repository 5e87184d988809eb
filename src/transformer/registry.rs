//! Registry of transformer factories, keyed by name.
use std::collections::BTreeMap;

use derivative::Derivative;

use crate::error::{CosimError, Result};

use super::{shared, Elementary, LinearDelay, LinearRate, RatesToSpikes, SharedTransformer, SpikesToRates};

pub const ELEMENTARY: &str = "elementary";
pub const LINEAR_RATE: &str = "linear_rate";
pub const RATES_TO_SPIKES: &str = "rates_to_spikes";
pub const SPIKES_TO_RATES: &str = "spikes_to_rates";
pub const LINEAR_DELAY: &str = "linear_delay";

/// Everything a factory may need to know about the pipeline it builds a transformer for.
#[derive(Debug, PartialEq, Clone)]
pub struct TransformerContext {
    /// The label of the endpoint, e.g., `in_R_3`.
    pub label: String,
    /// The synchronization time step (in ms).
    pub dt: f64,
    /// The total number of neurons of the populations behind the endpoint.
    pub number_of_neurons: usize,
    /// The scale factor configured for the endpoint.
    pub scale: f64,
    /// The rate estimation window (in ms), if any.
    pub window: Option<f64>,
    /// The seed of stochastic transformers.
    pub seed: u64,
    /// The stream of stochastic transformers, distinct for every endpoint.
    pub stream: u64,
}

type Factory = Box<dyn Fn(&TransformerContext) -> Result<SharedTransformer>>;

/// A map from string keys to transformer factories.
/// The registry is built once and handed to the interface builder.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct TransformerRegistry {
    #[derivative(Debug(format_with = "fmt_keys"))]
    factories: BTreeMap<String, Factory>,
}

fn fmt_keys(factories: &BTreeMap<String, Factory>, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_list().entries(factories.keys()).finish()
}

impl TransformerRegistry {
    /// Create a registry without any factory.
    pub fn empty() -> Self {
        TransformerRegistry::default()
    }

    /// Create a registry with the built-in transformers.
    pub fn new() -> Self {
        let mut registry = TransformerRegistry::empty();
        registry.register(ELEMENTARY, |_| Ok(shared(Elementary::new())));
        registry.register(LINEAR_RATE, |ctx| {
            Ok(shared(LinearRate::new(vec![ctx.scale], 0.0)))
        });
        registry.register(RATES_TO_SPIKES, |ctx| {
            let transformer =
                RatesToSpikes::new(ctx.dt, ctx.number_of_neurons, ctx.scale, ctx.seed, ctx.stream)?;
            Ok(shared(transformer))
        });
        registry.register(SPIKES_TO_RATES, |ctx| {
            let transformer = SpikesToRates::new(ctx.window.unwrap_or(ctx.dt), ctx.dt, ctx.scale)?;
            Ok(shared(transformer))
        });
        registry.register(LINEAR_DELAY, |ctx| {
            Ok(shared(LinearDelay::new(ctx.dt)))
        });
        registry
    }

    /// Register a factory under the given key, replacing any previous factory with that key.
    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&TransformerContext) -> Result<SharedTransformer> + 'static,
    {
        self.factories.insert(key.to_string(), Box::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Returns the registered keys, in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(|key| key.as_str())
    }

    /// Build a new transformer with the factory registered under the given key.
    /// The function returns an error if no factory is registered under that key.
    pub fn create(&self, key: &str, ctx: &TransformerContext) -> Result<SharedTransformer> {
        let factory = self.factories.get(key).ok_or_else(|| {
            CosimError::InvalidParameters(format!("no transformer registered under {:?}", key))
        })?;
        factory(ctx)
    }
}
