//! Solidity AST fingerprints
//!
//! Walks the direct children of a contract definition in a solc compact
//! AST and fingerprints every function twice:
//!
//! - **implementation hash**: blake3 over the sanitized subtree. Node ids,
//!   byte offsets and other volatile metadata are stripped first, so
//!   reformatting or renumbering does not register as change.
//! - **source hash**: blake3 over the exact source bytes the node spans.
//!   Any textual change registers, comments and whitespace included.

use crate::facet::{InternalRoutineInfo, Visibility};
use crate::hash::ContentHash;
use crate::selector::Selector;
use serde_json::{Map, Value};

/// Keys removed before structural hashing
pub const VOLATILE_KEYS: &[&str] = &[
    "id",
    "src",
    "nameLocation",
    "nameLocations",
    "referencedDeclaration",
    "scope",
    "overloadedDeclarations",
    "baseFunctions",
    "typeIdentifier",
    "documentation",
];

/// Copy of `node` with every volatile key removed, recursively
#[must_use]
pub fn sanitize(node: &Value) -> Value {
    match node {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !VOLATILE_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize(v)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

/// Byte span of a node, parsed from solc's `start:length:fileIndex`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub length: usize,
}

impl SourceSpan {
    /// Parse a `src` attribute
    #[must_use]
    pub fn parse(src: &str) -> Option<Self> {
        let mut parts = src.split(':');
        let start = parts.next()?.parse().ok()?;
        let length = parts.next()?.parse().ok()?;
        Some(Self { start, length })
    }

    /// Bytes of `source` covered by this span
    #[must_use]
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a [u8]> {
        source.as_bytes().get(self.start..self.start.checked_add(self.length)?)
    }
}

/// A function definition found in a contract body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstFunction {
    pub name: String,
    pub visibility: Visibility,
    /// `functionSelector` as emitted by solc for exported functions
    pub function_selector: Option<Selector>,
    /// Canonical signature rebuilt from parameter type strings, when every
    /// parameter type can be expressed without struct expansion
    pub signature: Option<String>,
    pub implementation_hash: ContentHash,
    pub source_hash: ContentHash,
}

impl AstFunction {
    /// Selector of this function, from solc's own field or the rebuilt signature
    #[must_use]
    pub fn selector(&self) -> Option<Selector> {
        self.function_selector
            .or_else(|| self.signature.as_deref().map(Selector::from_signature))
    }

    /// Internal-routine view of this function
    #[must_use]
    pub fn to_routine(&self) -> InternalRoutineInfo {
        InternalRoutineInfo {
            name: self.name.clone(),
            visibility: self.visibility,
            implementation_hash: self.implementation_hash,
            source_hash: self.source_hash,
        }
    }
}

/// Functions of one contract, split by visibility
#[derive(Debug, Clone, Default)]
pub struct ContractFunctions {
    pub exported: Vec<AstFunction>,
    pub internal: Vec<InternalRoutineInfo>,
}

/// Locate `contract_name` in a source unit AST and fingerprint its functions.
///
/// Returns `None` when the contract is not defined in this source unit.
#[must_use]
pub fn contract_functions(
    source_unit: &Value,
    contract_name: &str,
    source_text: &str,
) -> Option<ContractFunctions> {
    let contract = source_unit
        .get("nodes")?
        .as_array()?
        .iter()
        .find(|node| {
            node_type(node) == Some("ContractDefinition")
                && node.get("name").and_then(Value::as_str) == Some(contract_name)
        })?;

    let mut functions = ContractFunctions::default();
    let children = contract.get("nodes").and_then(Value::as_array)?;
    for child in children {
        if node_type(child) != Some("FunctionDefinition") {
            continue;
        }
        // constructors, fallback and receive have no selector and no name
        if child.get("kind").and_then(Value::as_str) != Some("function") {
            continue;
        }
        let Some(function) = fingerprint_function(child, source_text) else {
            tracing::debug!(contract = contract_name, "skipping function without usable span");
            continue;
        };
        if function.visibility.is_exported() {
            functions.exported.push(function);
        } else {
            functions.internal.push(function.to_routine());
        }
    }
    Some(functions)
}

fn node_type(node: &Value) -> Option<&str> {
    node.get("nodeType").and_then(Value::as_str)
}

fn fingerprint_function(node: &Value, source_text: &str) -> Option<AstFunction> {
    let name = node.get("name").and_then(Value::as_str)?.to_string();
    let visibility = Visibility::from_solc(node.get("visibility").and_then(Value::as_str)?)?;
    let span = SourceSpan::parse(node.get("src").and_then(Value::as_str)?)?;
    let source_bytes = span.slice(source_text)?;

    let function_selector = node
        .get("functionSelector")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok());

    let signature = parameter_types(node)
        .map(|types| format!("{name}({})", types.join(",")));

    Some(AstFunction {
        name,
        visibility,
        function_selector,
        signature,
        implementation_hash: ContentHash::compute_canonical(&sanitize(node)),
        source_hash: ContentHash::compute(source_bytes),
    })
}

fn parameter_types(function: &Value) -> Option<Vec<String>> {
    function
        .get("parameters")?
        .get("parameters")?
        .as_array()?
        .iter()
        .map(|param| {
            let type_string = param
                .get("typeDescriptions")?
                .get("typeString")?
                .as_str()?;
            canonical_ast_type(type_string)
        })
        .collect()
}

/// Map a solc `typeString` to its ABI spelling.
///
/// Returns `None` for structs, which need member types to expand.
#[must_use]
pub fn canonical_ast_type(type_string: &str) -> Option<String> {
    let mut t = type_string.trim();
    loop {
        let stripped = [" memory", " calldata", " storage", " pointer", " ref"]
            .iter()
            .find_map(|suffix| t.strip_suffix(suffix));
        match stripped {
            Some(rest) => t = rest.trim_end(),
            None => break,
        }
    }

    let (base, array_suffix) = match t.find('[') {
        Some(idx) => (&t[..idx], &t[idx..]),
        None => (t, ""),
    };
    let base = base.trim();

    let canonical = if base.starts_with("struct ") {
        return None;
    } else if base.starts_with("contract ") || base.starts_with("interface ") {
        "address"
    } else if base.starts_with("enum ") {
        "uint8"
    } else if base == "address payable" {
        "address"
    } else {
        base
    };
    Some(format!("{canonical}{array_suffix}"))
}
