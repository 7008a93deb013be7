//! Render context
//!
//! A [`RenderContext`] is created for each top level render. It resolves
//! variables against a chain of namespaces, highest priority first:
//!
//! 1. layers pushed with [`RenderContext::extend`]
//! 2. `locals`, written by `assign` and `capture`
//! 3. globals: render data, then template globals, then environment globals
//! 4. built-ins (`now`, `today`)
//! 5. counters, written by `increment` and `decrement`
//!
//! Partials rendered with the `render` tag get a [`RenderContext::copy`] with
//! an independent namespace. Limits that must hold across copies are carried
//! into the copy by value.

mod output;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::inheritance::{BlockFrame, BlockStacks};
use crate::environment::Environment;
use crate::error::{LiquidError, ResourceLimit, Span};
use crate::filters::FilterFunction;
use crate::query::{Query, Scope};
use crate::template::Template;
use crate::undefined::Undefined;
use crate::value::Value;

pub use output::OutputBuffer;

/// A mapping of names to values
pub type Namespace = IndexMap<String, Value>;

/// Render state for one template render
pub struct RenderContext {
    pub env: Arc<Environment>,
    /// The template currently being rendered
    pub template: Arc<Template>,
    globals: Vec<Arc<Namespace>>,
    /// Shared with block scoped copies, cloned on write while shared
    layers: Vec<Arc<Namespace>>,
    locals: Arc<Namespace>,
    builtins: Namespace,
    counters: Arc<Namespace>,
    pub disabled_tags: HashSet<String>,
    copy_depth: usize,
    loop_iteration_carry: usize,
    local_namespace_carry: usize,
    loop_lengths: Vec<usize>,
    stop_indexes: HashMap<String, usize>,
    cycles: HashMap<String, usize>,
    pub(crate) block_stacks: Arc<BlockStacks>,
    pub(crate) block_frame: Option<BlockFrame>,
    auto_escape: bool,
}

impl RenderContext {
    /// A root context for rendering `template` with `data`
    pub fn new(template: Arc<Template>, data: Namespace) -> Self {
        let env = Arc::clone(&template.env);
        let globals = vec![
            Arc::new(data),
            Arc::clone(&template.globals),
            Arc::clone(&env.globals),
        ];
        Self::with_globals(env, template, globals)
    }

    fn with_globals(
        env: Arc<Environment>,
        template: Arc<Template>,
        globals: Vec<Arc<Namespace>>,
    ) -> Self {
        let auto_escape = env.config.auto_escape;
        Self {
            env,
            template,
            globals,
            layers: Vec::new(),
            locals: Arc::default(),
            builtins: builtins(),
            counters: Arc::default(),
            disabled_tags: HashSet::new(),
            copy_depth: 0,
            loop_iteration_carry: 1,
            local_namespace_carry: 0,
            loop_lengths: Vec::new(),
            stop_indexes: HashMap::new(),
            cycles: HashMap::new(),
            block_stacks: Arc::new(BlockStacks::default()),
            block_frame: None,
            auto_escape,
        }
    }

    pub fn auto_escape(&self) -> bool {
        self.auto_escape
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Resolve `query` against the scope chain
    ///
    /// No match gives an undefined value, one match gives that value and
    /// several matches give an array of the matched values.
    pub fn get(&mut self, query: &Query, span: Span) -> Result<Value, LiquidError> {
        if self.block_frame.is_some()
            && query.as_names().map_or(false, |names| names == ["block", "super"])
        {
            return self.render_block_super(span);
        }

        let max_depth = self.env.config.max_recursion_depth;
        let found = query.find_in_scope(&*self, max_depth)?.into_value();
        Ok(match found {
            Some(value) => value,
            None => self.undefined(query.to_string(), span),
        })
    }

    /// Resolve a single top level name
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.lookup(name)
    }

    pub fn undefined(&self, path: impl Into<String>, span: Span) -> Value {
        Value::Undefined(Undefined::new(path, Some(span), self.env.config.undefined))
    }

    /// Write to the local namespace, checking its size limit
    pub fn assign(&mut self, name: impl Into<String>, value: Value) -> Result<(), LiquidError> {
        Arc::make_mut(&mut self.locals).insert(name.into(), value);

        if let Some(limit) = self.env.config.local_namespace_limit {
            let size = self.local_namespace_size();
            if size > limit {
                return Err(LiquidError::limit(
                    ResourceLimit::LocalNamespace,
                    format!("local namespace is {} bytes, the limit is {}", size, limit),
                    None,
                ));
            }
        }
        Ok(())
    }

    /// Approximate size in bytes of `locals`, including anything carried
    /// in from the context this one was copied from
    pub fn local_namespace_size(&self) -> usize {
        let size: usize = self
            .locals
            .iter()
            .map(|(k, v)| k.len() + approximate_size(v))
            .sum();
        size + self.local_namespace_carry
    }

    /// Set a name in the innermost pushed layer, or in `locals` if there is none
    pub fn set_scoped(&mut self, name: impl Into<String>, value: Value) {
        match self.layers.last_mut() {
            Some(layer) => {
                Arc::make_mut(layer).insert(name.into(), value);
            }
            None => {
                Arc::make_mut(&mut self.locals).insert(name.into(), value);
            }
        }
    }

    /// Output the counter's current value, then add one
    pub fn increment(&mut self, name: &str) -> i64 {
        let current = self.counters.get(name).and_then(Value::as_int).unwrap_or(0);
        Arc::make_mut(&mut self.counters).insert(name.to_string(), Value::Int(current + 1));
        current
    }

    /// Subtract one, then output the counter's value
    pub fn decrement(&mut self, name: &str) -> i64 {
        let current = self.counters.get(name).and_then(Value::as_int).unwrap_or(0) - 1;
        Arc::make_mut(&mut self.counters).insert(name.to_string(), Value::Int(current));
        current
    }

    /// Next index for a `cycle` group, wrapping at `length`
    pub fn cycle(&mut self, key: &str, length: usize) -> usize {
        let index = self.cycles.entry(key.to_string()).or_insert(0);
        let current = *index % length.max(1);
        *index = current + 1;
        current
    }

    /// Where the loop identified by `key` last stopped, forgetting it
    pub fn take_stop_index(&mut self, key: &str) -> usize {
        self.stop_indexes.remove(key).unwrap_or(0)
    }

    pub fn set_stop_index(&mut self, key: impl Into<String>, index: usize) {
        self.stop_indexes.insert(key.into(), index);
    }

    // ========================================================================
    // Filters
    // ========================================================================

    pub fn filter(&self, name: &str, span: Span) -> Result<FilterFunction, LiquidError> {
        self.env
            .filter(name)
            .ok_or_else(|| LiquidError::name(format!("unknown filter '{}'", name), span))
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Run `f` with `namespace` pushed on top of the scope chain
    ///
    /// The namespace is popped again however `f` exits. When `template` is
    /// given it replaces the current template for the duration of `f`.
    pub fn extend<T>(
        &mut self,
        namespace: Namespace,
        template: Option<Arc<Template>>,
        f: impl FnOnce(&mut RenderContext) -> Result<T, LiquidError>,
    ) -> Result<T, LiquidError> {
        if self.scope_size() > self.env.config.context_depth_limit {
            return Err(LiquidError::limit(
                ResourceLimit::ContextDepth,
                "maximum context depth reached, possible recursive include",
                None,
            ));
        }

        let previous = template.map(|t| std::mem::replace(&mut self.template, t));
        self.layers.push(Arc::new(namespace));
        let result = f(self);
        self.layers.pop();
        if let Some(template) = previous {
            self.template = template;
        }
        result
    }

    /// A new context with an independent namespace
    ///
    /// With `block_scope`, everything visible from this context stays
    /// visible, read only, from the copy. The copy shares this context's
    /// namespaces rather than cloning their values. Otherwise only globals
    /// are visible.
    pub fn copy(
        &self,
        namespace: Namespace,
        template: Option<Arc<Template>>,
        disabled_tags: Option<HashSet<String>>,
        carry_loop_iterations: bool,
        block_scope: bool,
    ) -> Result<RenderContext, LiquidError> {
        if self.copy_depth + 1 > self.env.config.context_depth_limit {
            return Err(LiquidError::limit(
                ResourceLimit::ContextDepth,
                "maximum context depth reached, possible recursive render",
                None,
            ));
        }

        let mut globals = vec![Arc::new(namespace)];
        if block_scope {
            globals.extend(self.layers.iter().rev().cloned());
            globals.push(Arc::clone(&self.locals));
        }
        globals.extend(self.globals.iter().cloned());
        if block_scope {
            globals.push(Arc::clone(&self.counters));
        }

        let template = template.unwrap_or_else(|| Arc::clone(&self.template));
        let mut context = RenderContext::with_globals(Arc::clone(&self.env), template, globals);
        context.disabled_tags = disabled_tags.unwrap_or_else(|| self.disabled_tags.clone());
        context.copy_depth = self.copy_depth + 1;
        context.local_namespace_carry = self.local_namespace_size();
        context.loop_iteration_carry = if carry_loop_iterations {
            self.loop_lengths
                .iter()
                .fold(self.loop_iteration_carry, |acc, n| acc.saturating_mul(*n))
        } else {
            1
        };
        if block_scope {
            context.block_stacks = Arc::clone(&self.block_stacks);
        }
        Ok(context)
    }

    /// Number of namespaces in the scope chain
    fn scope_size(&self) -> usize {
        self.layers.len() + 4
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// Enter a loop of `length` iterations, checking the iteration limit
    pub fn push_loop(&mut self, length: usize) -> Result<(), LiquidError> {
        if let Some(limit) = self.env.config.loop_iteration_limit {
            let total = self
                .loop_lengths
                .iter()
                .fold(length.saturating_mul(self.loop_iteration_carry), |acc, n| {
                    acc.saturating_mul(*n)
                });
            if total > limit {
                return Err(LiquidError::limit(
                    ResourceLimit::LoopIterations,
                    format!("{} iterations exceeds the limit of {}", total, limit),
                    None,
                ));
            }
        }
        self.loop_lengths.push(length);
        Ok(())
    }

    pub fn pop_loop(&mut self) {
        self.loop_lengths.pop();
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    fn render_block_super(&mut self, span: Span) -> Result<Value, LiquidError> {
        let frame = match &self.block_frame {
            Some(frame) => frame.clone(),
            None => return Ok(self.undefined("block.super", span)),
        };

        let stacks = Arc::clone(&self.block_stacks);
        let item = match frame.parent.and_then(|index| stacks.items.get(index)) {
            Some(item) => item,
            None => return Ok(self.undefined("block.super", span)),
        };

        let mut buf = OutputBuffer::new(frame.limit);
        let mut namespace = Namespace::new();
        namespace.insert("block".to_string(), block_object(&item.name));

        let previous = self.block_frame.replace(BlockFrame {
            name: item.name.clone(),
            parent: item.parent,
            limit: frame.limit,
        });
        let template = Some(Arc::clone(&item.template));
        let result = self.extend(namespace, template, |ctx| item.body.render(ctx, &mut buf));
        self.block_frame = previous;
        result?;

        let text = buf.into_string();
        Ok(if self.auto_escape {
            Value::Markup(text)
        } else {
            Value::String(text)
        })
    }
}

/// `{"name": name}`, bound to `block` while a block renders
pub(crate) fn block_object(name: &str) -> Value {
    let mut block = Namespace::new();
    block.insert("name".to_string(), Value::from(name));
    Value::Object(block)
}

fn builtins() -> Namespace {
    let now = chrono::Local::now();
    let mut builtins = Namespace::new();
    builtins.insert(
        "now".to_string(),
        Value::String(now.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    builtins.insert(
        "today".to_string(),
        Value::String(now.format("%Y-%m-%d").to_string()),
    );
    builtins
}

/// Rough in-memory size of a value, in bytes
fn approximate_size(value: &Value) -> usize {
    match value {
        Value::String(s) | Value::Markup(s) => s.len() + 24,
        Value::Array(items) => items.iter().map(approximate_size).sum::<usize>() + 24,
        Value::Object(map) => {
            map.iter()
                .map(|(k, v)| k.len() + approximate_size(v))
                .sum::<usize>()
                + 48
        }
        Value::Undefined(u) => u.path.len() + 8,
        _ => 8,
    }
}

impl Scope for RenderContext {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.get(name))
            .or_else(|| self.locals.get(name))
            .or_else(|| self.globals.iter().find_map(|ns| ns.get(name)))
            .or_else(|| self.builtins.get(name))
            .or_else(|| self.counters.get(name))
    }

    fn entries(&self) -> Vec<(&str, &Value)> {
        let mut seen = HashSet::new();
        let namespaces = self
            .layers
            .iter()
            .rev()
            .chain(std::iter::once(&self.locals))
            .chain(self.globals.iter())
            .map(|ns| ns.as_ref())
            .chain(std::iter::once(&self.builtins))
            .chain(std::iter::once(self.counters.as_ref()));

        let mut entries = Vec::new();
        for namespace in namespaces {
            for (name, value) in namespace {
                if seen.insert(name.as_str()) {
                    entries.push((name.as_str(), value));
                }
            }
        }
        entries
    }
}

#[cfg(test)]
impl RenderContext {
    /// A context for an empty template, with `data` as render data
    pub(crate) fn for_test(env: &Arc<Environment>, data: serde_json::Value) -> RenderContext {
        let template = env.from_string("").expect("empty template parses");
        let data = match Value::from_json(&data) {
            Value::Object(map) => map,
            _ => Namespace::new(),
        };
        RenderContext::new(Arc::new(template), data)
    }
}
