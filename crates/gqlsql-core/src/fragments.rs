//! Fragment inliner: substitutes `...Name` spreads with the named
//! fragment's selection set (spec.md §2 step 3).

use gqlsql_error::{CompileError, EntityKind, Result};

use crate::ast::{Document, Operation, Selection};

/// Inline every fragment spread in `operation`'s selection set, resolving
/// named fragments from `doc`.
///
/// # Errors
/// Returns [`CompileError::UnknownEntity`] if a spread names a fragment
/// absent from the document.
pub fn inline_fragments<'src>(
    doc: &Document<'src>,
    operation: &Operation<'src>,
) -> Result<Vec<Selection<'src>>> {
    let mut seen = Vec::new();
    inline_selection_set(doc, &operation.selection_set, &mut seen)
}

fn inline_selection_set<'src>(
    doc: &Document<'src>,
    selections: &[Selection<'src>],
    in_progress: &mut Vec<&'src str>,
) -> Result<Vec<Selection<'src>>> {
    let mut out = Vec::with_capacity(selections.len());
    for sel in selections {
        match sel {
            Selection::Field(f) => {
                let mut f = f.clone();
                f.selection_set = inline_selection_set(doc, &f.selection_set, in_progress)?;
                out.push(Selection::Field(f));
            }
            Selection::InlineFragment { on_type, directives, selection_set } => {
                out.push(Selection::InlineFragment {
                    on_type: *on_type,
                    directives: directives.clone(),
                    selection_set: inline_selection_set(doc, selection_set, in_progress)?,
                });
            }
            Selection::FragmentSpread { name, .. } => {
                if in_progress.contains(name) {
                    return Err(CompileError::invalid_argument(
                        "<fragment>",
                        *name,
                        "fragment spread forms a cycle",
                    ));
                }
                let def = doc
                    .fragments
                    .get(name)
                    .ok_or_else(|| CompileError::unknown(EntityKind::Fragment, *name))?;
                in_progress.push(name);
                let inlined = inline_selection_set(doc, &def.selection_set, in_progress)?;
                in_progress.pop();
                out.extend(inlined);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn inlines_named_fragment() {
        let doc = parse(
            "{ products { ...Frag } } fragment Frag on Product { id name }",
        )
        .unwrap();
        let inlined = inline_fragments(&doc, &doc.operations[0]).unwrap();
        let Selection::Field(products) = &inlined[0] else { panic!() };
        assert_eq!(products.selection_set.len(), 2);
    }

    #[test]
    fn unknown_fragment_is_an_error() {
        let doc = parse("{ products { ...Missing } }").unwrap();
        let err = inline_fragments(&doc, &doc.operations[0]).unwrap_err();
        assert!(matches!(err, CompileError::UnknownEntity { .. }));
    }

    #[test]
    fn cyclic_fragment_spread_is_rejected() {
        let doc = parse(
            "{ products { ...A } } fragment A on Product { ...B } fragment B on Product { ...A }",
        )
        .unwrap();
        let err = inline_fragments(&doc, &doc.operations[0]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArgument { .. }));
    }
}
