//! Per-call-site inference constraints.
//!
//! A [`TypeConstraint`] accumulates upper and lower bounds on the inference
//! variables of one generic call site while arguments are checked, then
//! [`TypeConstraint::solve`] picks a concrete instantiation or marks the
//! constraint unsolvable. Constraints are small, short-lived, and owned by a
//! single thread; they move through three states, open, then solved or
//! unsolvable, and never back.

use smallvec::SmallVec;

use crate::global_state::GlobalState;
use crate::symbols::SymbolRef;
use crate::types::{approximate, instantiate_under, is_subtype, all, any, Type, TypePtr};

#[cfg(test)]
mod tests;

type BoundVec = SmallVec<[(SymbolRef, TypePtr); 4]>;

/// Bounds and (after solving) the instantiation for one call site's
/// inference variables.
#[derive(Debug, Default)]
pub struct TypeConstraint {
    upper_bounds: BoundVec,
    lower_bounds: BoundVec,
    solution: BoundVec,
    was_solved: bool,
    cant_solve: bool,
}

impl TypeConstraint {
    pub fn new() -> TypeConstraint {
        TypeConstraint::default()
    }

    /// No bounds recorded and nothing solved.
    pub fn is_empty(&self) -> bool {
        self.upper_bounds.is_empty() && self.lower_bounds.is_empty() && self.solution.is_empty()
    }

    pub fn is_solved(&self) -> bool {
        self.was_solved
    }

    pub fn is_unsolvable(&self) -> bool {
        self.cant_solve
    }

    /// The inference variables this constraint knows about, in first-seen
    /// order.
    pub fn domain(&self) -> Vec<SymbolRef> {
        let mut out: Vec<SymbolRef> = Vec::new();
        for &(sym, _) in self.upper_bounds.iter().chain(&self.lower_bounds) {
            if !out.contains(&sym) {
                out.push(sym);
            }
        }
        out
    }

    /// Seed the variables of a call site before argument checking: a
    /// covariant variable starts from bottom and is raised by lower bounds;
    /// anything else starts below top and is cut down by upper bounds.
    pub fn define_domain(&mut self, gs: &GlobalState, params: &[SymbolRef]) {
        assert!(!self.was_solved, "domain defined after solving");
        for &param in params {
            debug_assert!(gs.symbol(param).is_type_param());
            match gs.symbol(param).variance() {
                crate::symbols::Variance::Covariant => {
                    self.lower_bounds.push((param, TypePtr::bottom()));
                }
                _ => {
                    self.upper_bounds.push((param, TypePtr::top()));
                }
            }
        }
    }

    /// Record `var <: bound`, meeting it into any existing upper bound.
    ///
    /// A bound that is not fully defined cannot be combined through the
    /// lattice yet; it is conjoined structurally and dealt with at solve
    /// time.
    pub fn record_upper_bound(&mut self, gs: &GlobalState, sym: SymbolRef, bound: TypePtr) {
        assert!(!self.was_solved, "bound recorded after solving");
        match Self::find(&mut self.upper_bounds, sym) {
            Some(entry) => {
                *entry = if bound.is_fully_defined() && entry.is_fully_defined() {
                    all(gs, entry, &bound)
                } else {
                    TypePtr::new(Type::And {
                        left: entry.clone(),
                        right: bound,
                    })
                };
            }
            None => self.upper_bounds.push((sym, bound)),
        }
    }

    /// Record `bound <: var`, joining it into any existing lower bound.
    pub fn record_lower_bound(&mut self, gs: &GlobalState, sym: SymbolRef, bound: TypePtr) {
        assert!(!self.was_solved, "bound recorded after solving");
        match Self::find(&mut self.lower_bounds, sym) {
            Some(entry) => {
                *entry = if bound.is_fully_defined() && entry.is_fully_defined() {
                    any(gs, entry, &bound)
                } else {
                    TypePtr::new(Type::Or {
                        left: entry.clone(),
                        right: bound,
                    })
                };
            }
            None => self.lower_bounds.push((sym, bound)),
        }
    }

    /// Pick an instantiation consistent with every recorded bound.
    ///
    /// Idempotent: a solved constraint stays solved, a failed solve is
    /// cached and every later call fails without re-deriving it.
    pub fn solve(&mut self, gs: &GlobalState) -> bool {
        if self.cant_solve {
            return false;
        }
        if self.was_solved {
            return true;
        }

        // Candidate solutions come from upper bounds. The seeded top bound
        // is no evidence and must not shadow lower bounds recorded later.
        for i in 0..self.upper_bounds.len() {
            let (sym, bound) = self.upper_bounds[i].clone();
            if bound.is_top() {
                continue;
            }
            let guess = approximate(gs, &bound, self);
            Self::set(&mut self.solution, sym, guess);
        }
        for i in 0..self.lower_bounds.len() {
            let (sym, bound) = self.lower_bounds[i].clone();
            if self.solution.iter().any(|&(s, _)| s == sym) {
                continue;
            }
            let guess = approximate(gs, &bound, self);
            Self::set(&mut self.solution, sym, guess);
        }
        // A variable whose only evidence is its upper bound solves to that
        // bound, the seeded top included.
        for i in 0..self.upper_bounds.len() {
            let (sym, bound) = self.upper_bounds[i].clone();
            if !self.solution.iter().any(|&(s, _)| s == sym) {
                Self::set(&mut self.solution, sym, bound);
            }
        }

        // Verify, expanding variables that appear inside bounds through the
        // candidate solution.
        self.was_solved = true;
        for i in 0..self.upper_bounds.len() {
            let (sym, bound) = self.upper_bounds[i].clone();
            let expanded = instantiate_under(gs, &bound, self);
            if !is_subtype(gs, &self.instantiation_for(sym), &expanded) {
                self.fail();
                return false;
            }
        }
        for i in 0..self.lower_bounds.len() {
            let (sym, bound) = self.lower_bounds[i].clone();
            let expanded = instantiate_under(gs, &bound, self);
            if !is_subtype(gs, &expanded, &self.instantiation_for(sym)) {
                self.fail();
                return false;
            }
        }
        tracing::trace!(vars = self.solution.len(), "constraint solved");
        true
    }

    fn fail(&mut self) {
        self.was_solved = false;
        self.cant_solve = true;
        self.solution.clear();
    }

    /// The solved instantiation for `sym`; a variable no bound ever
    /// mentioned solves to untyped.
    pub fn instantiation_for(&self, sym: SymbolRef) -> TypePtr {
        assert!(self.was_solved, "instantiation read from an unsolved constraint");
        self.solution
            .iter()
            .find(|&&(s, _)| s == sym)
            .map_or_else(TypePtr::untyped, |(_, ty)| ty.clone())
    }

    /// Whether `t1 <: t2` already follows from the recorded bounds, without
    /// recording anything. A left variable is read through its lower bound,
    /// a right variable through its upper bound; an unbounded variable has
    /// only the trivial answers.
    pub fn is_already_satisfied(&self, gs: &GlobalState, t1: &TypePtr, t2: &TypePtr) -> bool {
        if let Type::TypeVar { sym } = &**t1 {
            return match self.lower_bound(*sym) {
                Some(bound) => is_subtype(gs, bound, t2),
                None => is_subtype(gs, &TypePtr::top(), t2),
            };
        }
        if let Type::TypeVar { sym } = &**t2 {
            return match self.upper_bound(*sym) {
                Some(bound) => is_subtype(gs, t1, bound),
                None => is_subtype(gs, t1, &TypePtr::bottom()),
            };
        }
        is_subtype(gs, t1, t2)
    }

    pub(crate) fn upper_bound(&self, sym: SymbolRef) -> Option<&TypePtr> {
        self.upper_bounds
            .iter()
            .find(|&&(s, _)| s == sym)
            .map(|(_, ty)| ty)
    }

    fn lower_bound(&self, sym: SymbolRef) -> Option<&TypePtr> {
        self.lower_bounds
            .iter()
            .find(|&&(s, _)| s == sym)
            .map(|(_, ty)| ty)
    }

    /// Copy an open constraint, e.g. to try a speculative overload without
    /// committing its bounds.
    pub fn deep_copy(&self) -> TypeConstraint {
        assert!(!self.was_solved, "solved constraints must not fork");
        TypeConstraint {
            upper_bounds: self.upper_bounds.clone(),
            lower_bounds: self.lower_bounds.clone(),
            solution: self.solution.clone(),
            was_solved: false,
            cant_solve: self.cant_solve,
        }
    }

    /// Debug rendering of all recorded bounds and solutions.
    pub fn show(&self, gs: &GlobalState) -> String {
        let mut out = String::new();
        for (sym, bound) in &self.upper_bounds {
            out.push_str(&format!("{} <: {}\n", sym.show(gs), bound.show(gs)));
        }
        for (sym, bound) in &self.lower_bounds {
            out.push_str(&format!("{} :> {}\n", sym.show(gs), bound.show(gs)));
        }
        for (sym, ty) in &self.solution {
            out.push_str(&format!("{} = {}\n", sym.show(gs), ty.show(gs)));
        }
        out
    }

    fn find(bounds: &mut BoundVec, sym: SymbolRef) -> Option<&mut TypePtr> {
        bounds
            .iter_mut()
            .find(|&&mut (s, _)| s == sym)
            .map(|(_, ty)| ty)
    }

    fn set(bounds: &mut BoundVec, sym: SymbolRef, ty: TypePtr) {
        match bounds.iter_mut().find(|&&mut (s, _)| s == sym) {
            Some((_, entry)) => *entry = ty,
            None => bounds.push((sym, ty)),
        }
    }
}
