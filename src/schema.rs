//! JSON-Schema view of a resolved range.
//!
//! The executable-validation counterpart of `render`: descriptors become
//! plain schema trees, and each recursive any-shape definition becomes a
//! self-referential `$defs` entry keyed by its stable identifier, referenced
//! from every use site. Leaf tokens that name a JSON primitive map to the
//! primitive schema; anything else is emitted as a `#/$defs/<token>`
//! reference for the caller to supply.

use serde_json::{json, Value};

use crate::ir::{any_shape_id, RecursiveDef, Resolved, Ty};

/// Emit the full schema for a resolved range, `$defs` included.
pub fn emit_schema(res: &Resolved) -> Value {
    let mut root = schema_of(&res.ty);
    if !res.defs.is_empty() {
        let mut defs = serde_json::Map::new();
        for (id, def) in &res.defs {
            defs.insert(id.clone(), def_schema(def));
        }
        root["$defs"] = Value::Object(defs);
    }
    root
}

fn schema_of(ty: &Ty) -> Value {
    match ty {
        Ty::Leaf(dtype) => leaf_schema(dtype),

        Ty::FixedNesting { depth, inner } => {
            let mut out = schema_of(inner);
            for _ in 0..*depth {
                out = json!({ "type": "array", "items": out });
            }
            out
        }

        Ty::BoundedLength { min, max, inner } => {
            let mut out = json!({ "type": "array", "items": schema_of(inner) });
            if let Some(lo) = *min {
                out["minItems"] = Value::from(lo);
            }
            if let Some(hi) = *max {
                out["maxItems"] = Value::from(hi);
            }
            out
        }

        // use sites reference the shared definition; rank >= 1 is enforced
        // by the outer array level, exactly as in the definition itself
        Ty::RecursiveAny { item } => {
            json!({ "type": "array", "items": { "$ref": ref_path(&recursive_ref_id(item)) } })
        }

        Ty::OneOf(arms) => {
            json!({ "oneOf": arms.iter().map(schema_of).collect::<Vec<_>>() })
        }
    }
}

/// The self-referential definition body: a value of the recursive type is
/// either a sequence of the same type or the leaf itself.
fn def_schema(def: &RecursiveDef) -> Value {
    json!({
        "oneOf": [
            { "type": "array", "items": { "$ref": ref_path(&def.id) } },
            leaf_schema(&def.dtype),
        ]
    })
}

fn recursive_ref_id(item: &Ty) -> String {
    match item {
        Ty::Leaf(dtype) => any_shape_id(dtype),
        // the resolver only builds leaf items; collapse anything else to the
        // shared unconstrained definition
        _ => any_shape_id("Any"),
    }
}

fn ref_path(id: &str) -> String {
    format!("#/$defs/{id}")
}

fn leaf_schema(dtype: &str) -> Value {
    let token = dtype.to_ascii_lowercase();
    match token.as_str() {
        "any" | "anytype" => json!({}),
        "int" | "integer" => json!({ "type": "integer" }),
        "float" | "double" | "decimal" | "number" => json!({ "type": "number" }),
        "str" | "string" => json!({ "type": "string" }),
        "bool" | "boolean" => json!({ "type": "boolean" }),
        "null" => json!({ "type": "null" }),
        _ => json!({ "$ref": ref_path(dtype) }),
    }
}

// ------------------------------- Tests ------------------------------------ //
