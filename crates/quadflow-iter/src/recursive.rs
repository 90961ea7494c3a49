//! Recursive: breadth-first transitive closure of a morphism.
//!
//! Starting from the results of a base iterator (depth 0), the morphism is
//! applied once per depth to the values discovered at the previous depth.
//! Every value is emitted at most once, at the first depth it is reached;
//! the seen table is global to the whole traversal, so cycles terminate.
//!
//! Values are grouped per depth into *slots*, one per variable-binding
//! snapshot under which they were found. Each slot gets its own morphism
//! application, and when a result is emitted the slot's snapshot is restored
//! into the context, so variable users downstream see the binding the result
//! was derived under.
//!
//! Each emitted value remembers the value one level up that produced it.
//! Walking that chain down to depth 1 recovers the seed, which keys the path
//! map used by `next_path` and `tag_results`.

use std::fmt;

use ahash::AHashMap;

use crate::config::IterConfig;
use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    close_all, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    RunStats, Tagger, Uid,
};
use crate::primitives::Null;
use crate::store::{display_value, Morphism, StoreRef};
use crate::value::{Bindings, TagMap, Value, ValueKey};

/// Tag placed on each morphism input so results can name their parent.
const BASE_TAG: &str = "__base_recursive";

#[derive(Debug, Clone)]
struct SeenAt {
    depth: usize,
    /// The value one depth up that produced this one (the seed at depth 1).
    origin: Value,
}

/// One morphism application at the current depth.
#[derive(Debug)]
struct Frontier {
    vars: Bindings,
    it: BoxIterator,
}

impl Frontier {
    fn placeholder() -> Self {
        Self {
            vars: Bindings::new(),
            it: Box::new(Null::new()),
        }
    }
}

/// Values found at one depth under one binding snapshot.
#[derive(Debug)]
struct DepthSlot {
    vars: Bindings,
    vals: Vec<Value>,
}

/// Breadth-first closure of `morphism` over the results of `sub`, bounded by
/// the configured maximum depth.
pub struct Recursive {
    uid: Uid,
    tags: Tagger,
    depth_tags: Tagger,
    sub: BoxIterator,
    store: StoreRef,
    morphism: Morphism,
    config: IterConfig,

    seen: AHashMap<ValueKey, SeenAt>,
    path_map: AHashMap<ValueKey, Vec<TagMap>>,
    path_index: usize,
    /// Seed the current result traces back to.
    base: Option<Value>,
    result: Option<Value>,
    result_depth: usize,

    depth: usize,
    frontiers: Vec<Frontier>,
    current: usize,
    depth_cache: Vec<DepthSlot>,
    vars: Bindings,
    seeded: bool,
    exhausted: bool,

    err: Option<IterError>,
    retire_err: Option<IterError>,
    runstats: RunStats,
    closed: Option<IterResult<()>>,
}

impl fmt::Debug for Recursive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recursive")
            .field("uid", &self.uid)
            .field("sub", &self.sub)
            .field("depth", &self.depth)
            .field("max_depth", &self.config.max_recursive_depth)
            .field("seen", &self.seen.len())
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl Recursive {
    pub fn new(store: StoreRef, sub: BoxIterator, morphism: Morphism, max_depth: usize) -> Self {
        let config = IterConfig {
            max_recursive_depth: max_depth,
            ..IterConfig::default()
        };
        Self::with_config(store, sub, morphism, config)
    }

    pub fn with_config(
        store: StoreRef,
        sub: BoxIterator,
        morphism: Morphism,
        config: IterConfig,
    ) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            depth_tags: Tagger::new(),
            sub,
            store,
            morphism,
            config,
            seen: AHashMap::new(),
            path_map: AHashMap::new(),
            path_index: 0,
            base: None,
            result: None,
            result_depth: 0,
            depth: 0,
            frontiers: vec![Frontier::placeholder()],
            current: 0,
            depth_cache: Vec::new(),
            vars: Bindings::new(),
            seeded: false,
            exhausted: false,
            err: None,
            retire_err: None,
            runstats: RunStats::default(),
            closed: None,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.config.max_recursive_depth
    }

    /// Tag that resolves to the depth the current result was found at.
    pub fn add_depth_tag(&mut self, tag: impl Into<String>) {
        self.depth_tags.add(tag);
    }

    /// Depth at which the current result was found.
    pub fn result_depth(&self) -> usize {
        self.result_depth
    }

    /// Resolve the seed that `value` was ultimately derived from.
    pub fn base_value(&self, value: &Value) -> IterResult<Value> {
        let mut at = self.seen.get(&value.key()).ok_or(IterError::UnseenValue)?;
        loop {
            match at.depth {
                1 => return Ok(at.origin.clone()),
                0 => return Err(IterError::BrokenSeenChain { depth: 0 }),
                depth => {
                    let parent = self
                        .seen
                        .get(&at.origin.key())
                        .ok_or(IterError::BrokenSeenChain { depth })?;
                    if parent.depth >= depth {
                        return Err(IterError::BrokenSeenChain { depth });
                    }
                    at = parent;
                }
            }
        }
    }

    fn fail(&mut self, err: IterError) -> bool {
        if err.is_invariant_violation() {
            tracing::warn!(uid = self.uid, error = %err, "recursive iterator invariant violated");
        } else {
            tracing::debug!(uid = self.uid, error = %err, "recursive iterator stopped on upstream error");
        }
        self.err = Some(err);
        self.result = None;
        self.exhausted = true;
        false
    }

    /// True (and remembers the new snapshot) if the context's bindings moved
    /// since this iterator last produced a result.
    fn vars_updated(&mut self, ctx: &IterationContext) -> bool {
        let now = ctx.values();
        if now == self.vars {
            return false;
        }
        tracing::trace!(uid = self.uid, was = %self.vars, now = %now, "bindings changed");
        self.vars = now;
        true
    }

    /// Depth 0: drain the base iterator into binding-keyed slots.
    fn seed(&mut self, ctx: &mut IterationContext) -> bool {
        self.seeded = true;
        self.depth_cache.push(DepthSlot {
            vars: ctx.values(),
            vals: Vec::new(),
        });

        while self.sub.advance(ctx) {
            let Some(value) = self.sub.result().cloned() else {
                continue;
            };

            let snapshot = ctx.values();
            let reopen = self
                .depth_cache
                .last()
                .map_or(true, |open| open.vars != snapshot);
            if reopen {
                if self
                    .depth_cache
                    .last()
                    .is_some_and(|open| open.vals.is_empty())
                {
                    self.depth_cache.pop();
                }
                self.depth_cache.push(DepthSlot {
                    vars: snapshot,
                    vals: Vec::new(),
                });
            }
            if let Some(open) = self.depth_cache.last_mut() {
                open.vals.push(value.clone());
            }

            let paths = self.path_map.entry(value.key()).or_default();
            let mut tags = TagMap::new();
            self.sub.tag_results(&mut tags);
            paths.push(tags);
            while self.sub.next_path(ctx) {
                let mut tags = TagMap::new();
                self.sub.tag_results(&mut tags);
                paths.push(tags);
            }
        }

        if let Some(err) = self.sub.err().cloned() {
            return self.fail(err);
        }
        tracing::debug!(
            uid = self.uid,
            slots = self.depth_cache.len(),
            seeds = self.path_map.len(),
            "recursive base drained"
        );
        true
    }

    /// Close frontiers that are about to be dropped, remembering the first
    /// failure for `close`.
    fn retire_frontiers(&mut self, frontiers: Vec<Frontier>) {
        let mut its: Vec<BoxIterator> = frontiers.into_iter().map(|f| f.it).collect();
        if let Err(err) = close_all(its.iter_mut()) {
            self.retire_err.get_or_insert(err);
        }
    }

    /// Build the next depth's frontiers. False when the traversal is over.
    fn next_depth(&mut self) -> bool {
        self.depth += 1;
        if self.depth > self.config.max_recursive_depth {
            tracing::debug!(uid = self.uid, depth = self.depth, "recursive depth limit reached");
            return false;
        }
        if self.depth_cache.is_empty() {
            return false;
        }

        let slots = std::mem::take(&mut self.depth_cache);
        let mut frontiers = Vec::with_capacity(slots.len());
        for slot in slots {
            if slot.vals.is_empty() {
                continue;
            }
            let mut base = self.store.fixed_iterator();
            for value in slot.vals {
                base.add(value);
            }
            base.tagger_mut().add(BASE_TAG);
            let it = (self.morphism)(&self.store, Box::new(base));
            frontiers.push(Frontier {
                vars: slot.vars.clone(),
                it,
            });
            self.depth_cache.push(DepthSlot {
                vars: slot.vars,
                vals: Vec::new(),
            });
        }
        if frontiers.is_empty() {
            frontiers.push(Frontier::placeholder());
        }

        tracing::debug!(
            uid = self.uid,
            depth = self.depth,
            frontiers = frontiers.len(),
            "recursive depth advanced"
        );
        let old = std::mem::replace(&mut self.frontiers, frontiers);
        self.retire_frontiers(old);
        self.current = 0;
        true
    }

    /// Apply the morphism to a single sample value and inspect the result.
    fn sample_fanout<T>(&self, inspect: impl FnOnce(&dyn GraphIterator) -> T) -> T {
        let mut sample = self.store.fixed_iterator();
        sample.add(Value::int(self.config.stats_probe_value));
        let mut fanout_it = (self.morphism)(&self.store, Box::new(sample));
        let out = inspect(fanout_it.as_ref());
        if let Err(err) = fanout_it.close() {
            tracing::debug!(uid = self.uid, error = %err, "closing fanout sample failed");
        }
        out
    }

    fn frontier_tags(&self, dst: &mut TagMap) {
        if let Some(frontier) = self.frontiers.get(self.current) {
            frontier.it.tag_results(dst);
        }
    }
}

impl GraphIterator for Recursive {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Recursive
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, ctx: &mut IterationContext) -> bool {
        self.runstats.next += 1;
        self.path_index = 0;
        if self.exhausted || self.err.is_some() {
            return false;
        }
        if !self.seeded && !self.seed(ctx) {
            return false;
        }

        loop {
            let current = self.current;
            if !self.frontiers[current].it.advance(ctx) {
                if let Some(err) = self.frontiers[current].it.err().cloned() {
                    return self.fail(err);
                }
                if current + 1 < self.frontiers.len() {
                    self.current += 1;
                    continue;
                }
                if !self.next_depth() {
                    self.exhausted = true;
                    self.result = None;
                    return false;
                }
                continue;
            }

            let Some(value) = self.frontiers[current].it.result().cloned() else {
                continue;
            };
            let key = value.key();
            if self.seen.contains_key(&key) {
                continue;
            }

            let mut tags = TagMap::new();
            self.frontiers[current].it.tag_results(&mut tags);
            let Some(origin) = tags.remove(BASE_TAG) else {
                return self.fail(IterError::MissingBaseTag);
            };
            self.seen.insert(
                key,
                SeenAt {
                    depth: self.depth,
                    origin,
                },
            );
            match self.base_value(&value) {
                Ok(base) => self.base = Some(base),
                Err(err) => return self.fail(err),
            }
            if let Some(slot) = self.depth_cache.get_mut(current) {
                slot.vals.push(value.clone());
            }
            tracing::trace!(
                uid = self.uid,
                depth = self.depth,
                value = %display_value(self.store.as_ref(), &value),
                "recursive emitted"
            );
            self.result = Some(value);
            self.result_depth = self.depth;
            break;
        }

        let vars = self.frontiers[self.current].vars.clone();
        ctx.restore_bindings(&vars);
        self.vars = vars;
        true
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        if self.vars_updated(ctx) {
            self.reset();
        }
        if self.err.is_some() {
            return false;
        }
        self.path_index = 0;

        if let Some(depth) = self.seen.get(&value.key()).map(|at| at.depth) {
            match self.base_value(value) {
                Ok(base) => self.base = Some(base),
                Err(err) => return self.fail(err),
            }
            self.result = Some(value.clone());
            self.result_depth = depth;
            return true;
        }

        while self.advance(ctx) {
            self.runstats.contains_next += 1;
            if self.result.as_ref() == Some(value) {
                return true;
            }
        }
        false
    }

    fn next_path(&mut self, _ctx: &mut IterationContext) -> bool {
        let Some(base) = &self.base else {
            return false;
        };
        let paths = self.path_map.get(&base.key()).map_or(0, Vec::len);
        if self.path_index + 1 >= paths {
            return false;
        }
        self.path_index += 1;
        true
    }

    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn err(&self) -> Option<&IterError> {
        self.err.as_ref()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some(base) = &self.base {
            if let Some(paths) = self.path_map.get(&base.key()) {
                if let Some(path) = paths.get(self.path_index) {
                    dst.extend(path.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }
        self.frontier_tags(dst);
        dst.remove(BASE_TAG);

        if let Some(result) = &self.result {
            for tag in self.tags.tags() {
                dst.insert(tag.clone(), result.clone());
            }
            for tag in self.depth_tags.tags() {
                dst.insert(tag.clone(), Value::int(self.result_depth as i64));
            }
        }
        for (tag, value) in self.tags.fixed().iter().chain(self.depth_tags.fixed()) {
            dst.insert(tag.clone(), value.clone());
        }
    }

    fn box_clone(&self) -> BoxIterator {
        let mut out = Recursive::with_config(
            self.store.clone(),
            self.sub.box_clone(),
            self.morphism.clone(),
            self.config.clone(),
        );
        out.tags.copy_from(&self.tags);
        out.depth_tags.copy_from(&self.depth_tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.result = None;
        self.result_depth = 0;
        self.err = None;
        self.sub.reset();
        self.seen.clear();
        self.path_map.clear();
        self.base = None;
        self.path_index = 0;
        let old = std::mem::replace(&mut self.frontiers, vec![Frontier::placeholder()]);
        self.retire_frontiers(old);
        self.current = 0;
        self.depth = 0;
        self.depth_cache.clear();
        self.seeded = false;
        self.exhausted = false;
    }

    fn optimize(mut self: Box<Self>) -> (BoxIterator, bool) {
        let sub = std::mem::replace(&mut self.sub, Box::new(Null::new()));
        let (sub, _) = sub.optimize();
        self.sub = sub;
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        (self.stats().size, false)
    }

    fn stats(&self) -> IteratorStats {
        let fanout = self.sample_fanout(|it| it.stats());
        let sub = self.sub.stats();

        let grown = sub.size.saturating_mul(fanout.size) as f64;
        let size = grown.powi(self.config.stats_growth_exponent) as i64;
        let next_cost = sub.next_cost.saturating_add(fanout.next_cost);
        let amortized = size / self.config.stats_contains_amortization.max(1);
        let mut stats = IteratorStats {
            next_cost,
            contains_cost: next_cost
                .saturating_mul(amortized)
                .saturating_add(sub.contains_cost),
            size,
            exact_size: false,
            ..IteratorStats::default()
        };
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        let fanout = self.sample_fanout(|it| it.describe());
        Description {
            uid: self.uid,
            name: format!("max depth {}", self.config.max_recursive_depth),
            kind: IterKind::Recursive,
            tags: self.tags.names(),
            size: self.size().0,
            iterators: vec![self.sub.describe(), fanout],
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        vec![self.sub.as_ref()]
    }

    fn close(&mut self) -> IterResult<()> {
        if let Some(done) = &self.closed {
            return done.clone();
        }
        let mut first = self.retire_err.take();
        let its = std::iter::once(&mut self.sub).chain(self.frontiers.iter_mut().map(|f| &mut f.it));
        if let Err(err) = close_all(its) {
            first.get_or_insert(err);
        }
        self.seen.clear();
        self.path_map.clear();

        let res = match first {
            Some(err) => Err(err),
            None => Ok(()),
        };
        self.closed = Some(res.clone());
        res
    }
}
