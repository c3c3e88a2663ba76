use approx::assert_relative_eq;
use exprtape::{
    derivative, evaluate, evaluate_jacobian, Dataset, Error, Interpreter, Node, NodeKind,
    ReverseBuffer, Tree, Values,
};

fn tree(prefix: Vec<Node>) -> Tree {
    Tree::from_prefix(prefix).unwrap()
}

/// Central finite difference of the tree output with respect to slot `k`.
fn finite_diff(t: &Tree, d: &Dataset<f64>, c: &[f64], k: usize) -> Vec<f64> {
    let h = 1e-7;
    let mut cp = c.to_vec();
    let mut cm = c.to_vec();
    cp[k] += h;
    cm[k] -= h;
    let fp = evaluate(t, d, 0..d.rows(), &cp).unwrap();
    let fm = evaluate(t, d, 0..d.rows(), &cm).unwrap();
    fp.iter().zip(&fm).map(|(p, m)| (p - m) / (2.0 * h)).collect()
}

/// Compare every Jacobian column against finite differences.
fn check_jacobian(prefix: Vec<Node>, d: &Dataset<f64>, c: &[f64], tol: f64) {
    let t = tree(prefix);
    let (primal, jac) = evaluate_jacobian(&t, d, 0..d.rows(), c).unwrap();
    assert_eq!(primal, evaluate(&t, d, 0..d.rows(), c).unwrap());
    assert_eq!(jac.rows(), d.rows());
    assert_eq!(jac.cols(), c.len());
    for k in 0..c.len() {
        let expected = finite_diff(&t, d, c, k);
        for (r, (&got, &fd)) in jac.column(k).iter().zip(&expected).enumerate() {
            assert!(got.is_finite(), "{t}: J[{r},{k}] = {got}");
            assert_relative_eq!(got, fd, epsilon = 1e-6, max_relative = tol);
        }
    }
}

fn rows() -> Dataset<f64> {
    Dataset::from_columns(vec![vec![0.3, 0.5, 0.7, 0.9]]).unwrap()
}

// ── Scenarios ──

#[test]
fn mul_add_adjoints() {
    // mul(add(x0, c0), x1), stored as x1 c0 x0 add mul
    let t = tree(vec![
        Node::binary(NodeKind::Mul),
        Node::binary(NodeKind::Add),
        Node::variable(0),
        Node::coefficient(0),
        Node::variable(1),
    ]);
    let d = Dataset::from_columns(vec![vec![2.0, 3.0], vec![5.0, 7.0]]).unwrap();
    let interp = Interpreter::new(&t, &d).unwrap();

    let mut values = Values::new();
    let mut rev = ReverseBuffer::new();
    interp.forward(&[0.0], 0..2, &mut values).unwrap();
    interp.reverse(&values, &mut rev).unwrap();

    assert_eq!(values.col(4), &[10.0, 21.0]);
    assert_eq!(rev.adjoint(4), &[1.0, 1.0]);
    assert_eq!(rev.adjoint(1), &[5.0, 7.0]); // c0: x1
    assert_eq!(rev.adjoint(0), &[2.0, 3.0]); // x1: x0 + c0
    assert_eq!(rev.adjoint(2), &[5.0, 7.0]); // x0: x1

    let root = rev.node(4);
    assert_eq!(root.arity(), 2);
    assert_eq!(root.p, &[1.0, 1.0]);
    assert_eq!(root.d(0), &[5.0, 7.0]);
    assert_eq!(root.d(1), &[2.0, 3.0]);
    assert_eq!(rev.node(0).arity(), 0);

    let (primal, jac) = interp.jacobian(&[0.0], 0..2).unwrap();
    assert_eq!(primal, vec![10.0, 21.0]);
    assert_eq!(jac.column(0), &[5.0, 7.0]);
}

#[test]
fn div_partials() {
    // div(x0, x1), stored as x1 x0 div
    let t = tree(vec![
        Node::binary(NodeKind::Div),
        Node::variable(0),
        Node::variable(1),
    ]);
    let d = Dataset::from_columns(vec![vec![4.0], vec![2.0]]).unwrap();
    let interp = Interpreter::new(&t, &d).unwrap();
    let mut values = Values::new();
    let mut rev = ReverseBuffer::new();
    interp.forward(&[], 0..1, &mut values).unwrap();
    interp.reverse(&values, &mut rev).unwrap();

    assert_eq!(values.col(2), &[2.0]);
    assert_eq!(rev.partial(2, 0), &[0.5]);
    assert_eq!(rev.partial(2, 1), &[-1.0]);
    assert_eq!(rev.adjoint(1), &[0.5]);
    assert_eq!(rev.adjoint(0), &[-1.0]);
}

#[test]
fn derivative_rejects_unsupported_arity() {
    let t = tree(vec![
        Node::op(NodeKind::Div, 3),
        Node::variable(0),
        Node::variable(1),
        Node::variable(2),
    ]);
    let mut values = Values::new();
    values.resize(1, t.len());
    let mut rev = ReverseBuffer::new();
    rev.resize(&t, 1);

    let expected = Err(Error::UnsupportedArity {
        kind: NodeKind::Div,
        arity: 3,
    });
    assert_eq!(derivative(&t, &values, &mut rev, 3), expected);

    let d = Dataset::from_columns(vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap();
    let interp = Interpreter::new(&t, &d).unwrap();
    assert_eq!(interp.reverse(&values, &mut rev), expected);
    assert_eq!(interp.jacobian(&[], 0..1).err(), expected.err());
}

#[test]
fn derivative_requires_laid_out_buffer() {
    // div(x0, x1), stored as x1 x0 div
    let t = tree(vec![
        Node::binary(NodeKind::Div),
        Node::variable(0),
        Node::variable(1),
    ]);
    let d = Dataset::from_columns(vec![vec![4.0, 6.0], vec![2.0, 3.0]]).unwrap();
    let interp = Interpreter::new(&t, &d).unwrap();
    let mut values = Values::new();
    interp.forward(&[], 0..2, &mut values).unwrap();

    let mut rev = ReverseBuffer::new();
    assert_eq!(
        derivative(&t, &values, &mut rev, 2),
        Err(Error::ShapeMismatch {
            what: "reverse buffer nodes",
            expected: 3,
            actual: 0
        })
    );

    rev.resize(&t, 1);
    assert_eq!(
        derivative(&t, &values, &mut rev, 2),
        Err(Error::ShapeMismatch {
            what: "reverse buffer rows",
            expected: 2,
            actual: 1
        })
    );

    // laid out for a different tree of the same length
    let other = tree(vec![
        Node::unary(NodeKind::Exp),
        Node::unary(NodeKind::Sin),
        Node::variable(0),
    ]);
    rev.resize(&other, 2);
    assert!(matches!(
        derivative(&t, &values, &mut rev, 2),
        Err(Error::ShapeMismatch {
            what: "derivative columns",
            ..
        })
    ));

    rev.resize(&t, 2);
    derivative(&t, &values, &mut rev, 2).unwrap();
    assert_eq!(rev.partial(2, 0), &[0.0, 0.0]);
}

#[test]
fn seeded_reverse_scales_adjoints() {
    let t = tree(vec![
        Node::binary(NodeKind::Mul),
        Node::coefficient(0),
        Node::variable(0),
    ]);
    let d = rows();
    let interp = Interpreter::new(&t, &d).unwrap();
    let mut values = Values::new();
    let mut rev = ReverseBuffer::new();
    interp.forward(&[2.0], 0..4, &mut values).unwrap();

    interp.reverse_seeded(&values, &[1.0, 2.0, 3.0, 4.0], &mut rev).unwrap();
    // c0 sits at position 1 (stored: x0 c0 mul)
    for (&a, e) in rev.adjoint(1).iter().zip([0.3, 1.0, 2.1, 3.6]) {
        assert_relative_eq!(a, e, max_relative = 1e-14);
    }

    assert!(matches!(
        interp.reverse_seeded(&values, &[1.0], &mut rev),
        Err(Error::ShapeMismatch { expected: 4, actual: 1, .. })
    ));
}

#[test]
fn leaves_are_left_untouched() {
    let t = tree(vec![Node::coefficient(0)]);
    let d = rows();
    let (primal, jac) = evaluate_jacobian(&t, &d, 0..4, &[1.5]).unwrap();
    assert_eq!(primal, vec![1.5; 4]);
    assert_eq!(jac.column(0), &[1.0; 4]);
}

// ── Elementals against finite differences ──

#[test]
fn unary_rules() {
    let d = rows();
    let kinds = [
        NodeKind::Exp,
        NodeKind::Log,
        NodeKind::Log1p,
        NodeKind::Sin,
        NodeKind::Cos,
        NodeKind::Tan,
        NodeKind::Tanh,
        NodeKind::Asin,
        NodeKind::Acos,
        NodeKind::Atan,
        NodeKind::Sqrt,
        NodeKind::Cbrt,
    ];
    for kind in kinds {
        // kind(c0 * x0)
        let prefix = vec![
            Node::unary(kind),
            Node::binary(NodeKind::Mul),
            Node::coefficient(0),
            Node::variable(0),
        ];
        check_jacobian(prefix, &d, &[0.8], 1e-5);
    }
}

#[test]
fn abs_rules_on_negative_inputs() {
    let d = rows();
    for kind in [NodeKind::Logabs, NodeKind::Sqrtabs] {
        let prefix = vec![
            Node::unary(kind),
            Node::binary(NodeKind::Mul),
            Node::coefficient(0),
            Node::variable(0),
        ];
        check_jacobian(prefix.clone(), &d, &[-0.8], 1e-5);
        check_jacobian(prefix, &d, &[0.8], 1e-5);
    }
}

#[test]
fn binary_rules() {
    let d = rows();
    let c = [0.8, 1.7];
    let cx = || {
        vec![
            Node::binary(NodeKind::Mul),
            Node::coefficient(0),
            Node::variable(0),
        ]
    };
    for kind in [NodeKind::Aq, NodeKind::Pow, NodeKind::Div, NodeKind::Sub, NodeKind::Mul] {
        // kind(c0 * x0, c1)
        let mut prefix = vec![Node::binary(kind)];
        prefix.extend(cx());
        prefix.push(Node::coefficient(1));
        check_jacobian(prefix, &d, &c, 1e-5);

        // kind(c1, c0 * x0)
        let mut prefix = vec![Node::binary(kind), Node::coefficient(1)];
        prefix.extend(cx());
        check_jacobian(prefix, &d, &c, 1e-5);
    }
}

#[test]
fn unary_arithmetic_rules() {
    let d = rows();
    for kind in [NodeKind::Sub, NodeKind::Div, NodeKind::Add, NodeKind::Mul] {
        let prefix = vec![
            Node::unary(kind),
            Node::binary(NodeKind::Add),
            Node::coefficient(0),
            Node::variable(0),
        ];
        check_jacobian(prefix, &d, &[0.6], 1e-5);
    }
}

#[test]
fn nary_rules() {
    let d = rows();
    let c = [0.8, -1.3, 2.1];
    for kind in [NodeKind::Add, NodeKind::Sub, NodeKind::Mul] {
        for arity in [3u16, 4] {
            let mut prefix = vec![Node::op(kind, arity)];
            prefix.push(Node::coefficient(0));
            prefix.push(Node::variable(0));
            prefix.push(Node::coefficient(1));
            if arity == 4 {
                prefix.push(Node::unary(NodeKind::Exp));
                prefix.push(Node::coefficient(2));
            }
            let c = if arity == 4 { &c[..] } else { &c[..2] };
            check_jacobian(prefix, &d, c, 1e-5);
        }
    }
}

#[test]
fn nested_chain_rule() {
    // exp(sin(c0 * x0)) * aq(c1, x0 + c2)
    let prefix = vec![
        Node::binary(NodeKind::Mul),
        Node::unary(NodeKind::Exp),
        Node::unary(NodeKind::Sin),
        Node::binary(NodeKind::Mul),
        Node::coefficient(0),
        Node::variable(0),
        Node::binary(NodeKind::Aq),
        Node::coefficient(1),
        Node::binary(NodeKind::Add),
        Node::variable(0),
        Node::coefficient(2),
    ];
    check_jacobian(prefix, &rows(), &[1.1, 0.4, -0.2], 1e-5);
}

// ── Edge cases ──

#[test]
fn aq_is_finite_at_zero_numerator() {
    let t = tree(vec![
        Node::binary(NodeKind::Aq),
        Node::coefficient(0),
        Node::coefficient(1),
    ]);
    let d = rows();
    let (primal, jac) = evaluate_jacobian(&t, &d, 0..4, &[0.0, 2.0]).unwrap();
    assert!(primal.iter().all(|&v| v == 0.0));
    for &g in jac.column(0) {
        assert_relative_eq!(g, 1.0 / 5.0_f64.sqrt(), max_relative = 1e-14);
    }
    for &g in jac.column(1) {
        assert_eq!(g, 0.0);
    }
}

#[test]
fn pow_negative_base_is_nan() {
    let t = tree(vec![
        Node::binary(NodeKind::Pow),
        Node::coefficient(0),
        Node::constant(0.5),
    ]);
    let d = rows();
    let (primal, jac) = evaluate_jacobian(&t, &d, 0..4, &[-2.0]).unwrap();
    assert!(primal.iter().all(|v| v.is_nan()));
    assert!(jac.column(0).iter().all(|v| v.is_nan()));
}

#[test]
fn log_at_zero_is_not_an_error() {
    let t = tree(vec![Node::unary(NodeKind::Log), Node::coefficient(0)]);
    let d = rows();
    let (primal, jac) = evaluate_jacobian(&t, &d, 0..4, &[0.0]).unwrap();
    assert_eq!(primal[0], f64::NEG_INFINITY);
    assert_eq!(jac.get(0, 0), f64::INFINITY);
}

#[test]
fn abs_rules_at_zero_are_nan() {
    let t = tree(vec![Node::unary(NodeKind::Logabs), Node::coefficient(0)]);
    let d = rows();
    let (_, jac) = evaluate_jacobian(&t, &d, 0..4, &[0.0]).unwrap();
    // sign(0) / |0| = 0 / 0
    assert!(jac.get(0, 0).is_nan());

    let t = tree(vec![
        Node::unary(NodeKind::Sqrtabs),
        Node::binary(NodeKind::Add),
        Node::coefficient(0),
        Node::constant(4.0),
    ]);
    let (_, jac) = evaluate_jacobian(&t, &d, 0..4, &[-4.0]).unwrap();
    assert!(jac.get(0, 0).is_nan());
}

// ── Composition ──

#[test]
fn composition_matches_product_of_parts() {
    // f(g(c0)) with g = exp(c0 * x0), f = sin
    let d = rows();
    let c = [0.6];
    let g = tree(vec![
        Node::unary(NodeKind::Exp),
        Node::binary(NodeKind::Mul),
        Node::coefficient(0),
        Node::variable(0),
    ]);
    let fg = tree(vec![
        Node::unary(NodeKind::Sin),
        Node::unary(NodeKind::Exp),
        Node::binary(NodeKind::Mul),
        Node::coefficient(0),
        Node::variable(0),
    ]);
    let (inner, dg) = evaluate_jacobian(&g, &d, 0..4, &c).unwrap();
    let (_, dfg) = evaluate_jacobian(&fg, &d, 0..4, &c).unwrap();

    // f'(u) as the adjoint of the variable leaf of sin(x0), evaluated at u = g
    let f = tree(vec![Node::unary(NodeKind::Sin), Node::variable(0)]);
    let du = Dataset::from_columns(vec![inner]).unwrap();
    let interp = Interpreter::new(&f, &du).unwrap();
    let mut values = Values::new();
    let mut rev = ReverseBuffer::new();
    interp.forward(&[], 0..4, &mut values).unwrap();
    interp.reverse(&values, &mut rev).unwrap();

    for r in 0..4 {
        assert_relative_eq!(
            dfg.get(r, 0),
            rev.adjoint(0)[r] * dg.get(r, 0),
            max_relative = 1e-14
        );
    }
}
