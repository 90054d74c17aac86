#![forbid(unsafe_code)]

use porter_ast::{Binding, Sort};

use super::{Analysis, Rewrite, Strict};
use crate::error::{PassError, PassResult};

pub type SortOut<V> = <<V as SortVisitor>::Mode as SortMode>::Out;

/// Results of visiting a composite sort's components.
#[derive(Debug)]
pub enum SortParts<S> {
    Leaf,
    Function { domain: Vec<S>, range: S },
    Record { fields: Vec<Binding<S>> },
    Native { args: Vec<S> },
}

fn sort_kind(sort: &Sort) -> &'static str {
    match sort {
        Sort::Uninterpreted(_) => "Uninterpreted",
        Sort::Bool => "Bool",
        Sort::Number { .. } => "Number",
        Sort::BitVec(_) => "BitVec",
        Sort::Enum { .. } => "Enum",
        Sort::Function { .. } => "Function",
        Sort::Record { .. } => "Record",
        Sort::Native { .. } => "Native",
        Sort::Top => "Top",
    }
}

pub trait SortMode: Sized {
    type Out;

    fn finish_sort<V: SortVisitor<Mode = Self>>(
        v: &mut V,
        node: &Sort,
        parts: SortParts<Self::Out>,
    ) -> PassResult<Self::Out>;
}

impl<E, A> SortMode for Strict<E, A> {
    type Out = E;

    fn finish_sort<V: SortVisitor<Mode = Self>>(
        _v: &mut V,
        node: &Sort,
        _parts: SortParts<E>,
    ) -> PassResult<E> {
        Err(PassError::Unimplemented {
            node: sort_kind(node),
        })
    }
}

impl SortMode for Analysis {
    type Out = ();

    fn finish_sort<V: SortVisitor<Mode = Self>>(
        _v: &mut V,
        _node: &Sort,
        _parts: SortParts<()>,
    ) -> PassResult<()> {
        Ok(())
    }
}

impl SortMode for Rewrite {
    type Out = Sort;

    fn finish_sort<V: SortVisitor<Mode = Self>>(
        _v: &mut V,
        node: &Sort,
        parts: SortParts<Sort>,
    ) -> PassResult<Sort> {
        match (node, parts) {
            (Sort::Function { .. }, SortParts::Function { domain, range }) => {
                Ok(Sort::function(domain, range))
            }
            (Sort::Record { name, .. }, SortParts::Record { fields }) => Ok(Sort::Record {
                name: name.clone(),
                fields,
            }),
            (Sort::Native { position, fmt, .. }, SortParts::Native { args }) => Ok(Sort::Native {
                position: position.clone(),
                fmt: fmt.clone(),
                args,
            }),
            (
                Sort::Uninterpreted(_)
                | Sort::Bool
                | Sort::Number { .. }
                | Sort::BitVec(_)
                | Sort::Enum { .. }
                | Sort::Top,
                SortParts::Leaf,
            ) => Ok(node.clone()),
            (node, _) => Err(PassError::invariant(format!(
                "{} sort rebuilt from mismatched parts",
                sort_kind(node)
            ))),
        }
    }
}

/// A traversal over sorts. Leaf hooks and `finish_*` hooks default to the mode.
pub trait SortVisitor: Sized {
    type Mode: SortMode;

    fn bool(&mut self, node: &Sort) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Leaf)
    }

    fn bv(&mut self, node: &Sort) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Leaf)
    }

    fn enumeration(&mut self, node: &Sort) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Leaf)
    }

    fn numeric(&mut self, node: &Sort) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Leaf)
    }

    fn uninterpreted(&mut self, node: &Sort) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Leaf)
    }

    fn top(&mut self, node: &Sort) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Leaf)
    }

    fn begin_function(&mut self, _node: &Sort) -> PassResult<Option<SortOut<Self>>> {
        Ok(None)
    }

    fn finish_function(
        &mut self,
        node: &Sort,
        domain: Vec<SortOut<Self>>,
        range: SortOut<Self>,
    ) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Function { domain, range })
    }

    fn begin_record(&mut self, _node: &Sort) -> PassResult<Option<SortOut<Self>>> {
        Ok(None)
    }

    fn finish_record(
        &mut self,
        node: &Sort,
        fields: Vec<Binding<SortOut<Self>>>,
    ) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Record { fields })
    }

    fn begin_native(&mut self, _node: &Sort) -> PassResult<Option<SortOut<Self>>> {
        Ok(None)
    }

    fn finish_native(
        &mut self,
        node: &Sort,
        args: Vec<SortOut<Self>>,
    ) -> PassResult<SortOut<Self>> {
        Self::Mode::finish_sort(self, node, SortParts::Native { args })
    }

    fn visit_sort(&mut self, node: &Sort) -> PassResult<SortOut<Self>> {
        match node {
            Sort::Bool => self.bool(node),
            Sort::BitVec(_) => self.bv(node),
            Sort::Enum { .. } => self.enumeration(node),
            Sort::Number { .. } => self.numeric(node),
            Sort::Uninterpreted(_) => self.uninterpreted(node),
            Sort::Top => self.top(node),
            Sort::Function { domain, range } => {
                if let Some(out) = self.begin_function(node)? {
                    return Ok(out);
                }
                let domain = domain
                    .iter()
                    .map(|d| self.visit_sort(d))
                    .collect::<PassResult<Vec<_>>>()?;
                let range = self.visit_sort(range)?;
                self.finish_function(node, domain, range)
            }
            Sort::Record { fields, .. } => {
                if let Some(out) = self.begin_record(node)? {
                    return Ok(out);
                }
                let fields = fields
                    .iter()
                    .map(|f| Ok(Binding::new(f.name.clone(), self.visit_sort(&f.decl)?)))
                    .collect::<PassResult<Vec<_>>>()?;
                self.finish_record(node, fields)
            }
            Sort::Native { args, .. } => {
                if let Some(out) = self.begin_native(node)? {
                    return Ok(out);
                }
                let args = args
                    .iter()
                    .map(|a| self.visit_sort(a))
                    .collect::<PassResult<Vec<_>>>()?;
                self.finish_native(node, args)
            }
        }
    }
}
