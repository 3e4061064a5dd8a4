//! Memoizing Wrapper
//!
//! Wraps an arbitrary async computation with the cache: derive key and tag,
//! consult the cache, fall through to the computation on a miss, and fail
//! open when the store is unreachable. Cache unavailability must never make
//! the wrapped computation unavailable; caching only affects latency, never
//! the outcome.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::cache::{ArgSlice, CallArgs, FnCache, KeyBuilder, TagSpec};
use crate::error::Result;

// == Computation Trait ==
/// An expensive call worth caching.
///
/// The output type must round-trip losslessly through serde_json; a value
/// that cannot is a usage contract violation and surfaces as a
/// serialization error instead of being cached.
#[async_trait]
pub trait Computation: Send + Sync {
    type Output: Serialize + DeserializeOwned + Send;

    /// Name used as the function segment of the cache namespace.
    fn name(&self) -> &str;

    /// Runs the underlying computation.
    async fn compute(&self, args: &CallArgs) -> Self::Output;
}

// == Closure Adapter ==
/// Adapts a plain async function or closure into a [`Computation`].
pub struct FnComputation<F, T> {
    name: String,
    func: F,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> FnComputation<F, T> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T> Computation for FnComputation<F, T>
where
    F: Fn(CallArgs) -> Fut + Send + Sync,
    Fut: Future<Output = T> + Send,
    T: Serialize + DeserializeOwned + Send + Sync,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn compute(&self, args: &CallArgs) -> T {
        (self.func)(args.clone()).await
    }
}

// == Memoization Options ==
/// Per-function caching configuration supplied at wrap time.
#[derive(Debug, Clone, Default)]
pub struct MemoOptions {
    /// Restriction of the argument sequence used for the cache key.
    pub slice: ArgSlice,
    /// Tag template with a `{}` placeholder, e.g. `"user/{}"`.
    pub tag_template: Option<String>,
    /// Positional argument the tag is formatted with. Mutually exclusive
    /// with `tag_kwarg_name`.
    pub tag_arg_index: Option<usize>,
    /// Keyword argument the tag is formatted with.
    pub tag_kwarg_name: Option<String>,
}

// == Memoized Wrapper ==
/// A computation wrapped with the cache.
///
/// Call flow: derive key and tag, look up, return the decoded hit or run
/// the computation and store the result. Store-connectivity errors at any
/// point fall back to direct computation; configuration and serialization
/// errors propagate.
pub struct Memoized<C: Computation> {
    computation: C,
    cache: Option<FnCache>,
    keys: KeyBuilder,
}

impl<C: Computation> Memoized<C> {
    // == Constructor ==
    /// Wraps a computation. Tag configuration is validated here, before any
    /// call is made: supplying both selectors, or a template and selector
    /// that do not pair up, fails with a configuration error.
    ///
    /// `cache: None` wraps the computation in permanent bypass mode, for
    /// deployments without a configured store.
    pub fn new(computation: C, cache: Option<FnCache>, options: MemoOptions) -> Result<Self> {
        let tag = TagSpec::from_parts(
            options.tag_template,
            options.tag_arg_index,
            options.tag_kwarg_name,
        )?;
        Ok(Self {
            computation,
            cache,
            keys: KeyBuilder::new(options.slice, tag),
        })
    }

    /// Wraps a computation with caching disabled; every call runs directly.
    pub fn disabled(computation: C) -> Self {
        Self {
            computation,
            cache: None,
            keys: KeyBuilder::new(ArgSlice::full(), TagSpec::Untagged),
        }
    }

    /// True when calls go through the cache.
    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    // == Call ==
    /// Invokes the computation through the cache.
    ///
    /// Returns exactly what a direct call would return, whether the result
    /// came from the cache or was recomputed.
    pub async fn call(&self, args: CallArgs) -> Result<C::Output> {
        let Some(cache) = &self.cache else {
            return Ok(self.computation.compute(&args).await);
        };

        let name = self.computation.name();
        let key = self.keys.cache_key(&args)?;
        let tag = self.keys.tag(&args)?;

        match cache.get(name, &key, tag.as_deref()).await {
            Ok(Some(stored)) => Ok(serde_json::from_str(&stored)?),
            Ok(None) => {
                let value = self.computation.compute(&args).await;
                let encoded = serde_json::to_string(&value)?;
                // serde_json encodes non-finite floats as null rather than
                // erroring. Anything that does not decode back to the output
                // type must not be cached, so the lossy encoding surfaces
                // here instead of corrupting every later call.
                serde_json::from_str::<C::Output>(&encoded)?;
                if let Err(err) = cache.add(name, &key, &encoded, tag.as_deref()).await {
                    if !err.is_store() {
                        return Err(err);
                    }
                    warn!(function = name, error = %err, "store unavailable, result not cached");
                }
                Ok(value)
            }
            Err(err) if err.is_store() => {
                warn!(function = name, error = %err, "store unavailable, bypassing cache");
                Ok(self.computation.compute(&args).await)
            }
            Err(err) => Err(err),
        }
    }
}
