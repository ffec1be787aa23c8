//! Tree-to-text rendering of descriptors into the target type-expression
//! syntax, plus the support block (imports + injected recursive class) a
//! rendered range needs around it.
//!
//! Pure functions over `Ty`/`Resolved`; nothing here consults the original
//! shape spec.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{is_any_dtype, Resolved, Ty};

// ------------------------------ Range text -------------------------------- //

/// Render a descriptor as a single type expression.
pub fn render(ty: &Ty) -> String {
    match ty {
        Ty::Leaf(dtype) => dtype.clone(),

        Ty::FixedNesting { depth, inner } => {
            let depth = *depth as usize;
            format!("{}{}{}", "List[".repeat(depth), render(inner), "]".repeat(depth))
        }

        Ty::BoundedLength { min, max, inner } => {
            let mut items = Vec::new();
            if let Some(lo) = min {
                items.push(format!("min_length={lo}"));
            }
            if let Some(hi) = max {
                items.push(format!("max_length={hi}"));
            }
            items.push(format!("item_type={}", render(inner)));
            format!("conlist({})", items.join(", "))
        }

        Ty::RecursiveAny { item } => match item.as_ref() {
            // the unparameterized alias already means "any element type"
            Ty::Leaf(dtype) if is_any_dtype(dtype) => "AnyShapeArray".to_string(),
            other => format!("AnyShapeArray[{}]", render(other)),
        },

        Ty::OneOf(arms) => {
            let arms: Vec<String> = arms.iter().map(render).collect();
            format!("Union[{}]", arms.join(", "))
        }
    }
}

// ----------------------------- Support block ------------------------------ //

/// Class declaration injected once whenever a resolved range references a
/// recursive any-shape definition. The alias is generic; per-dtype use sites
/// parameterize it, and per-dtype schema definitions are keyed separately.
const ANY_SHAPE_DECL: &str = r#"_T = TypeVar("_T")
_RecursiveListType = Iterable[Union[_T, Iterable["_RecursiveListType"]]]


class AnyShapeArrayType(Generic[_T]):
    @classmethod
    def __get_pydantic_core_schema__(cls, source_type, handler):
        item_type = Any if get_args(get_args(source_type)[0])[0] is _T else get_args(get_args(source_type)[0])[0]
        item_schema = handler.generate_schema(item_type)
        if item_schema.get("type", "any") != "any":
            item_schema["strict"] = True
        item_name = "Any" if item_type is Any else item_type.__name__
        array_ref = f"any-shape-array-{item_name}"
        return core_schema.definitions_schema(
            core_schema.list_schema(core_schema.definition_reference_schema(array_ref)),
            [
                core_schema.union_schema(
                    [
                        core_schema.list_schema(core_schema.definition_reference_schema(array_ref)),
                        item_schema,
                    ],
                    ref=array_ref,
                )
            ],
        )


AnyShapeArray = Annotated[_RecursiveListType, AnyShapeArrayType]"#;

/// Render the import lines for a result's opaque import tokens, grouped by
/// module, deterministically ordered.
pub fn render_imports(imports: &BTreeSet<String>) -> String {
    let mut by_module: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for token in imports {
        match token.rsplit_once('.') {
            Some((module, name)) => {
                by_module.entry(module).or_default().insert(name);
            }
            None => {
                by_module.entry(token.as_str()).or_default();
            }
        }
    }
    let mut lines = Vec::new();
    for (module, names) in by_module {
        if names.is_empty() {
            lines.push(format!("import {module}"));
        } else {
            let names: Vec<&str> = names.into_iter().collect();
            lines.push(format!("from {module} import {}", names.join(", ")));
        }
    }
    lines.join("\n")
}

/// Render everything a range needs to stand alone: imports, the injected
/// recursive declaration when referenced, and the range expression itself.
pub fn render_module(res: &Resolved) -> String {
    let mut out = String::new();
    if !res.imports.is_empty() {
        out.push_str(&render_imports(&res.imports));
        out.push_str("\n\n");
    }
    if !res.defs.is_empty() {
        out.push_str(ANY_SHAPE_DECL);
        out.push_str("\n\n");
    }
    out.push_str(&format!("range = {}\n", render(&res.ty)));
    out
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use crate::spec::{ArrayShapeSpec, DimensionConstraint, RankBound};

    #[test]
    fn fixed_nesting_renders_as_list_of_lists() {
        assert_eq!(render(&Ty::nested(3, Ty::leaf("int"))), "List[List[List[int]]]");
        assert_eq!(render(&Ty::leaf("int")), "int");
    }

    #[test]
    fn bounded_length_renders_as_conlist_in_argument_order() {
        let ty = Ty::bounded(Some(2), None, Ty::leaf("float"));
        assert_eq!(render(&ty), "conlist(min_length=2, item_type=float)");

        let ty = Ty::bounded(Some(2), Some(5), Ty::leaf("float"));
        assert_eq!(render(&ty), "conlist(min_length=2, max_length=5, item_type=float)");

        let ty = Ty::bounded(None, Some(5), Ty::leaf("float"));
        assert_eq!(render(&ty), "conlist(max_length=5, item_type=float)");
    }

    #[test]
    fn recursive_any_parameterizes_unless_any() {
        let ty = Ty::RecursiveAny { item: Box::new(Ty::leaf("float")) };
        assert_eq!(render(&ty), "AnyShapeArray[float]");

        let ty = Ty::RecursiveAny { item: Box::new(Ty::leaf("AnyType")) };
        assert_eq!(render(&ty), "AnyShapeArray");
    }

    #[test]
    fn union_preserves_order() {
        let ty = Ty::OneOf(vec![
            Ty::nested(2, Ty::leaf("int")),
            Ty::nested(3, Ty::leaf("int")),
        ]);
        assert_eq!(render(&ty), "Union[List[List[int]], List[List[List[int]]]]");
    }

    #[test]
    fn nested_wraps_render_inside_out() {
        // conlist(min_length=3, item_type=conlist(min_length=2, item_type=float))
        let ty = Ty::bounded(
            Some(3),
            None,
            Ty::bounded(Some(2), None, Ty::leaf("float")),
        );
        assert_eq!(
            render(&ty),
            "conlist(min_length=3, item_type=conlist(min_length=2, item_type=float))"
        );
    }

    #[test]
    fn module_includes_imports_and_declaration_once() {
        let spec = ArrayShapeSpec {
            dimensions: vec![DimensionConstraint {
                minimum_cardinality: Some(2),
                ..Default::default()
            }],
            maximum_number_dimensions: Some(RankBound::Unbounded),
            ..Default::default()
        };
        let res = resolve(&spec, "float").unwrap();
        let text = render_module(&res);
        assert!(text.contains("from pydantic import GetCoreSchemaHandler, conlist"));
        assert!(text.contains("from typing import"));
        assert_eq!(text.matches("class AnyShapeArrayType").count(), 1);
        assert!(text.ends_with(
            "range = conlist(min_length=2, item_type=Union[AnyShapeArray[float], float])\n"
        ));
    }

    #[test]
    fn module_without_recursion_has_no_declaration() {
        let spec = ArrayShapeSpec { exact_number_dimensions: Some(2), ..Default::default() };
        let res = resolve(&spec, "int").unwrap();
        let text = render_module(&res);
        assert!(!text.contains("AnyShapeArrayType"));
        assert!(text.ends_with("range = List[List[int]]\n"));
    }
}
