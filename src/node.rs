//! Node kinds and the per-node payload of a [`Tree`](crate::tree::Tree).
//!
//! Each [`NodeKind`] is one symbol of the expression grammar. Scalar forward
//! evaluation of the unary kinds lives in [`eval_unary`]; the column-wise
//! forward and reverse rules live in the interpreter.

use std::fmt;

use crate::error::{Error, Result};
use crate::float::Float;

/// Sentinel stored in [`Node::operand`] for nodes that carry no leaf operand.
pub const UNUSED: u32 = u32::MAX;

/// Symbol kinds of the expression grammar.
///
/// Fits in a `u8`. Arithmetic kinds take their operands from child subtrees,
/// leaf kinds read a dataset column, a coefficient slot or a fixed value.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    // ── Arithmetic ──
    /// Sum of all children (n-ary).
    Add,
    /// First child minus the remaining children; negation when unary.
    Sub,
    /// Product of all children (n-ary).
    Mul,
    /// First child over second child; reciprocal when unary.
    Div,
    /// Analytic quotient `a / sqrt(1 + b²)`.
    Aq,
    /// First child raised to the second child.
    Pow,

    // ── Exp / Log ──
    Exp,
    Log,
    Log1p,
    /// `ln |x|`.
    Logabs,

    // ── Trig ──
    Sin,
    Cos,
    Tan,
    Tanh,
    Asin,
    Acos,
    Atan,

    // ── Roots ──
    Sqrt,
    /// `sqrt |x|`.
    Sqrtabs,
    Cbrt,

    // ── Leaves ──
    /// Dataset column reference. The column index is the node operand.
    Variable,
    /// Optimizable coefficient. The slot index is the node operand.
    Coefficient,
    /// Fixed numeric value, never differentiated against.
    Constant,
}

impl NodeKind {
    /// True for `Variable`, `Coefficient` and `Constant`.
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Variable | NodeKind::Coefficient | NodeKind::Constant
        )
    }

    /// True for the single-operand transcendental kinds.
    #[inline]
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            NodeKind::Exp
                | NodeKind::Log
                | NodeKind::Log1p
                | NodeKind::Logabs
                | NodeKind::Sin
                | NodeKind::Cos
                | NodeKind::Tan
                | NodeKind::Tanh
                | NodeKind::Asin
                | NodeKind::Acos
                | NodeKind::Atan
                | NodeKind::Sqrt
                | NodeKind::Sqrtabs
                | NodeKind::Cbrt
        )
    }

    /// Whether a node of this kind may have `arity` children.
    ///
    /// - `Add`, `Sub`, `Mul`: one or more
    /// - `Div`: one (reciprocal) or two
    /// - `Aq`, `Pow`: exactly two
    /// - unary kinds: exactly one
    /// - leaves: zero
    #[inline]
    pub fn supports_arity(self, arity: u16) -> bool {
        match self {
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul => arity >= 1,
            NodeKind::Div => arity == 1 || arity == 2,
            NodeKind::Aq | NodeKind::Pow => arity == 2,
            k if k.is_leaf() => arity == 0,
            _ => arity == 1,
        }
    }

    /// Like [`supports_arity`](Self::supports_arity) but fails with
    /// [`Error::UnsupportedArity`].
    #[inline]
    pub fn check_arity(self, arity: u16) -> Result<()> {
        if self.supports_arity(arity) {
            Ok(())
        } else {
            Err(Error::UnsupportedArity { kind: self, arity })
        }
    }

    /// Lower-case symbol name.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Add => "add",
            NodeKind::Sub => "sub",
            NodeKind::Mul => "mul",
            NodeKind::Div => "div",
            NodeKind::Aq => "aq",
            NodeKind::Pow => "pow",
            NodeKind::Exp => "exp",
            NodeKind::Log => "log",
            NodeKind::Log1p => "log1p",
            NodeKind::Logabs => "logabs",
            NodeKind::Sin => "sin",
            NodeKind::Cos => "cos",
            NodeKind::Tan => "tan",
            NodeKind::Tanh => "tanh",
            NodeKind::Asin => "asin",
            NodeKind::Acos => "acos",
            NodeKind::Atan => "atan",
            NodeKind::Sqrt => "sqrt",
            NodeKind::Sqrtabs => "sqrtabs",
            NodeKind::Cbrt => "cbrt",
            NodeKind::Variable => "variable",
            NodeKind::Coefficient => "coefficient",
            NodeKind::Constant => "constant",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One symbol of a postfix-encoded tree.
///
/// `size` is the number of nodes in the subtree rooted here, including the
/// node itself. It is what lets [`Tree`](crate::tree::Tree) recover child
/// boundaries from array positions alone.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub kind: NodeKind,
    pub arity: u16,
    pub size: u32,
    /// Dataset column (`Variable`) or coefficient slot (`Coefficient`).
    /// [`UNUSED`] for every other kind.
    pub operand: u32,
    /// Fixed value of a `Constant` leaf, zero otherwise.
    pub value: f64,
}

impl Node {
    /// An operator node with the given arity. `size` is filled in by the tree.
    pub fn op(kind: NodeKind, arity: u16) -> Self {
        Node {
            kind,
            arity,
            size: 1,
            operand: UNUSED,
            value: 0.0,
        }
    }

    /// A unary operator node.
    pub fn unary(kind: NodeKind) -> Self {
        Self::op(kind, 1)
    }

    /// A binary operator node.
    pub fn binary(kind: NodeKind) -> Self {
        Self::op(kind, 2)
    }

    /// Leaf reading dataset column `column`.
    pub fn variable(column: u32) -> Self {
        Node {
            kind: NodeKind::Variable,
            arity: 0,
            size: 1,
            operand: column,
            value: 0.0,
        }
    }

    /// Leaf reading coefficient slot `slot`.
    pub fn coefficient(slot: u32) -> Self {
        Node {
            kind: NodeKind::Coefficient,
            arity: 0,
            size: 1,
            operand: slot,
            value: 0.0,
        }
    }

    /// Leaf with a fixed value.
    pub fn constant(value: f64) -> Self {
        Node {
            kind: NodeKind::Constant,
            arity: 0,
            size: 1,
            operand: UNUSED,
            value,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    /// Coefficient slot, if this is a coefficient leaf.
    #[inline]
    pub fn coefficient_slot(&self) -> Option<usize> {
        (self.kind == NodeKind::Coefficient).then_some(self.operand as usize)
    }

    /// Dataset column, if this is a variable leaf.
    #[inline]
    pub fn variable_column(&self) -> Option<usize> {
        (self.kind == NodeKind::Variable).then_some(self.operand as usize)
    }
}

/// Sign with `sign(0) = 0`, propagating NaN.
#[inline]
pub(crate) fn sign<T: Float>(x: T) -> T {
    if x > T::zero() {
        T::one()
    } else if x < T::zero() {
        -T::one()
    } else {
        x
    }
}

/// Evaluate a unary kind on a single value.
///
/// Domain violations are not special-cased: `log(-1)` is NaN, `log(0)` is
/// `-inf`, exactly as the underlying float operations produce them.
///
/// # Panics
///
/// Panics if `kind` is not a unary kind.
#[inline]
pub fn eval_unary<T: Float>(kind: NodeKind, x: T) -> T {
    match kind {
        NodeKind::Exp => x.exp(),
        NodeKind::Log => x.ln(),
        NodeKind::Log1p => x.ln_1p(),
        NodeKind::Logabs => x.abs().ln(),

        NodeKind::Sin => x.sin(),
        NodeKind::Cos => x.cos(),
        NodeKind::Tan => x.tan(),
        NodeKind::Tanh => x.tanh(),
        NodeKind::Asin => x.asin(),
        NodeKind::Acos => x.acos(),
        NodeKind::Atan => x.atan(),

        NodeKind::Sqrt => x.sqrt(),
        NodeKind::Sqrtabs => x.abs().sqrt(),
        NodeKind::Cbrt => x.cbrt(),

        k => unreachable!("{k} is not a unary kind"),
    }
}
