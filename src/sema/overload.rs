use crate::ast::{
    decls::{DeclId, DeclKind},
    stmts::ExprPtr,
    types::{BuiltinClass, TypeId},
};

use super::sema::Sema;

/// How an argument reaches a parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionRank {
    Exact,
    /// Widening that keeps every value: bool/char to a wider integer, a
    /// narrower integer of compatible signedness, f32 to f64.
    Promotion,
    Conversion,
}

/// Conversion counts of one viable candidate; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidateScore {
    pub conversions: usize,
    pub promotions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverloadOutcome {
    Success(DeclId),
    NoViable,
    Ambiguous(Vec<DeclId>),
}

pub fn classify_builtin_conversion(from: BuiltinClass, to: BuiltinClass) -> Option<ConversionRank> {
    if from == to {
        return Some(ConversionRank::Exact);
    }
    if !from.is_arithmetic() || !to.is_arithmetic() {
        return None;
    }

    let promotion = match (from.is_floating(), to.is_floating()) {
        (true, true) => to.rank() > from.rank(),
        (false, false) => match from {
            BuiltinClass::Bool | BuiltinClass::Char => to != BuiltinClass::Bool,
            _ => to.rank() > from.rank() && (to.is_signed() || !from.is_signed()),
        },
        _ => false,
    };

    Some(if promotion {
        ConversionRank::Promotion
    } else {
        ConversionRank::Conversion
    })
}

impl Sema {
    /// Rank of the implicit conversion from `from` to `to`, or `None` when
    /// there is none.
    pub fn classify_conversion(&self, from: TypeId, to: TypeId) -> Option<ConversionRank> {
        if self.ast.is_same_type(from, to) {
            return Some(ConversionRank::Exact);
        }

        let to_class = self.ast.builtin_class(to)?;
        let from_class = self.ast.arithmetic_class(from)?;
        let rank = classify_builtin_conversion(from_class, to_class)?;

        // Enums reach integers by conversion only
        if self.ast.builtin_class(from).is_none() {
            return Some(ConversionRank::Conversion);
        }
        Some(rank)
    }

    /// Finds the member of `overload_set` whose parameter list is identical
    /// to the one of `candidate`, regardless of result types.
    pub fn check_function_overload(&self, candidate: TypeId, overload_set: &[DeclId]) -> Option<DeclId> {
        let (_, params, _) = self.ast.function_signature(candidate)?;

        overload_set.iter().copied().find(|existing| {
            let entry = self.ast.get_decl(*existing);
            if entry.kind != DeclKind::Function {
                return false;
            }
            let Some((_, existing_params, _)) = entry.ty.and_then(|ty| self.ast.function_signature(ty)) else {
                return false;
            };

            existing_params.len() == params.len()
                && existing_params
                    .iter()
                    .zip(params)
                    .all(|(a, b)| self.ast.is_same_type(*a, *b))
        })
    }

    /// Scores `function` against the argument list, `None` if it is not
    /// viable.
    pub fn score_candidate(&self, function: DeclId, args: &[ExprPtr]) -> Option<CandidateScore> {
        let ty = self.ast.get_decl(function).ty?;
        let (_, params, variadic) = self.ast.function_signature(ty)?;

        if args.len() < params.len() || (args.len() > params.len() && !variadic) {
            return None;
        }

        let mut score = CandidateScore {
            conversions: 0,
            promotions: 0,
        };
        for (arg, param) in args.iter().zip(params) {
            match self.classify_conversion(arg.ty, *param)? {
                ConversionRank::Exact => {}
                ConversionRank::Promotion => score.promotions += 1,
                ConversionRank::Conversion => score.conversions += 1,
            }
        }
        Some(score)
    }

    /// Picks the best viable candidate: an exact match beats everything,
    /// then fewer conversions, then fewer promotions. Candidates tied on
    /// the best score make the call ambiguous.
    pub fn resolve_overload(&self, candidates: &[DeclId], args: &[ExprPtr]) -> OverloadOutcome {
        let scored: Vec<(DeclId, CandidateScore)> = candidates
            .iter()
            .filter_map(|candidate| {
                self.score_candidate(*candidate, args)
                    .map(|score| (*candidate, score))
            })
            .collect();

        let Some(best) = scored.iter().map(|(_, score)| *score).min() else {
            return OverloadOutcome::NoViable;
        };

        let winners: Vec<DeclId> = scored
            .iter()
            .filter(|(_, score)| *score == best)
            .map(|(decl, _)| *decl)
            .collect();

        match winners.as_slice() {
            [single] => OverloadOutcome::Success(*single),
            _ => OverloadOutcome::Ambiguous(winners),
        }
    }
}
