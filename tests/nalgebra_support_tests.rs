#![cfg(feature = "nalgebra")]

use approx::assert_relative_eq;
use exprtape::nalgebra_support::{
    fisher_information, gauss_newton, jacobian_nalgebra, jacobian_to_dmatrix, values_to_dmatrix,
};
use exprtape::{Dataset, Interpreter, Node, NodeKind, Tree, Values};
use nalgebra::DVector;

/// exp(c0 + c1 * x0)
fn tree() -> Tree {
    Tree::from_prefix(vec![
        Node::unary(NodeKind::Exp),
        Node::binary(NodeKind::Add),
        Node::coefficient(0),
        Node::binary(NodeKind::Mul),
        Node::coefficient(1),
        Node::variable(0),
    ])
    .unwrap()
}

fn dataset() -> Dataset<f64> {
    Dataset::from_columns(vec![vec![0.0, 0.5, 1.0, 1.5, 2.0]]).unwrap()
}

#[test]
fn jacobian_matrix_layout() {
    let t = tree();
    let d = dataset();
    let interp = Interpreter::new(&t, &d).unwrap();
    let (primal, jac) = interp.jacobian(&[0.1, 0.3], 0..5).unwrap();
    let m = jacobian_to_dmatrix(&jac);
    assert_eq!(m.nrows(), 5);
    assert_eq!(m.ncols(), 2);
    for r in 0..5 {
        assert_eq!(m[(r, 0)], jac.get(r, 0));
        assert_eq!(m[(r, 1)], jac.get(r, 1));
        // d/dc0 exp(...) = primal
        assert_relative_eq!(m[(r, 0)], primal[r], max_relative = 1e-14);
    }

    let c = DVector::from_vec(vec![0.1, 0.3]);
    let (p, j) = jacobian_nalgebra(&interp, &c, 0..5).unwrap();
    assert_eq!(p.as_slice(), primal.as_slice());
    assert_eq!(j, m);
}

#[test]
fn values_matrix_has_one_column_per_node() {
    let t = tree();
    let d = dataset();
    let mut values = Values::new();
    Interpreter::new(&t, &d)
        .unwrap()
        .forward(&[0.1, 0.3], 0..5, &mut values)
        .unwrap();
    let m = values_to_dmatrix(&values);
    assert_eq!(m.shape(), (5, t.len()));
    let root = t.len() - 1;
    assert!(m.column(root).iter().eq(values.col(root).iter()));
}

#[test]
fn fisher_with_unit_weights_is_gauss_newton() {
    let t = tree();
    let d = dataset();
    let (_, jac) = Interpreter::new(&t, &d).unwrap().jacobian(&[0.1, 0.3], 0..5).unwrap();
    let gn = gauss_newton(&jac);
    let fisher = fisher_information(&jac, &[1.0; 5]);
    assert_relative_eq!(gn, fisher, max_relative = 1e-14);

    let j = jacobian_to_dmatrix(&jac);
    assert_relative_eq!(gn, j.transpose() * &j, max_relative = 1e-14);
}

#[test]
fn poisson_fisher_information() {
    // For a log-link Poisson model the weights are the predicted rates.
    let t = tree();
    let d = dataset();
    let (rates, jac) = Interpreter::new(&t, &d).unwrap().jacobian(&[0.1, 0.3], 0..5).unwrap();
    let fisher = fisher_information(&jac, &rates);

    let x = d.column(0).unwrap();
    let mut expected = [[0.0; 2]; 2];
    for r in 0..5 {
        // J row = rate * [1, x]; weight = rate
        let g = [rates[r], rates[r] * x[r]];
        for a in 0..2 {
            for b in 0..2 {
                expected[a][b] += rates[r] * g[a] * g[b];
            }
        }
    }
    for a in 0..2 {
        for b in 0..2 {
            assert_relative_eq!(fisher[(a, b)], expected[a][b], max_relative = 1e-12);
        }
    }
}
