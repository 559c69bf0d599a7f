use crate::rule::RuleSpec;

/// Values a transition program can read while it runs for one cell.
#[derive(Clone, Copy, Debug)]
pub struct Env {
    pub state: u32,
    pub num_neighbors: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    U32(u32),
    State,
    Neighbors,
    Sub(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Equal(Box<Expr>, Box<Expr>),
    Or(Vec<Expr>),
}

use Expr::*;

impl Expr {
    pub fn to_shader(&self) -> String {
        match self {
            U32(val) => format!("{}u", val),
            State => "state".to_string(),
            Neighbors => "num_neighbors".to_string(),
            Sub(lhs, rhs) => format!("({} - {})", lhs.to_shader(), rhs.to_shader()),
            Gt(lhs, rhs) => format!("({} > {})", lhs.to_shader(), rhs.to_shader()),
            Equal(lhs, rhs) => format!("({} == {})", lhs.to_shader(), rhs.to_shader()),
            Or(terms) if terms.is_empty() => "false".to_string(),
            Or(terms) => {
                let terms: Vec<String> = terms.iter().map(Expr::to_shader).collect();
                format!("({})", terms.join(" || "))
            }
        }
    }

    /// Evaluates the expression on the host. Booleans are 0 or 1.
    pub fn eval(&self, env: &Env) -> u32 {
        match self {
            U32(val) => *val,
            State => env.state,
            Neighbors => env.num_neighbors,
            Sub(lhs, rhs) => lhs.eval(env).wrapping_sub(rhs.eval(env)),
            Gt(lhs, rhs) => (lhs.eval(env) > rhs.eval(env)) as u32,
            Equal(lhs, rhs) => (lhs.eval(env) == rhs.eval(env)) as u32,
            Or(terms) => terms.iter().any(|term| term.eval(env) != 0) as u32,
        }
    }
}

pub fn u32(value: u32) -> Expr {
    U32(value)
}

pub fn state() -> Expr {
    State
}

pub fn neighbors() -> Expr {
    Neighbors
}

pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
    Sub(Box::new(lhs), Box::new(rhs))
}

pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
    Gt(Box::new(lhs), Box::new(rhs))
}

pub fn equal(lhs: Expr, rhs: Expr) -> Expr {
    Equal(Box::new(lhs), Box::new(rhs))
}

pub fn any_of(terms: Vec<Expr>) -> Expr {
    Or(terms)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    SetResult(Expr),
    If {
        condition: Expr,
        if_true_then: Box<Statement>,
        if_false_then: Box<Statement>,
    },
}

use Statement::*;

impl Statement {
    pub fn to_shader(&self) -> String {
        match self {
            SetResult(expr) => format!("result = {};", expr.to_shader()),
            If {
                condition,
                if_true_then,
                if_false_then,
            } => format!(
                "if ({}) {{ {} }} else {{ {} }}",
                condition.to_shader(),
                if_true_then.to_shader(),
                if_false_then.to_shader()
            ),
        }
    }

    pub fn eval(&self, env: &Env) -> u32 {
        match self {
            SetResult(expr) => expr.eval(env),
            If {
                condition,
                if_true_then,
                if_false_then,
            } => {
                if condition.eval(env) != 0 {
                    if_true_then.eval(env)
                } else {
                    if_false_then.eval(env)
                }
            }
        }
    }
}

pub fn if_then_else(
    condition: Expr,
    if_true_then: Statement,
    if_false_then: Statement,
) -> Statement {
    If {
        condition,
        if_true_then: Box::new(if_true_then),
        if_false_then: Box::new(if_false_then),
    }
}

pub fn set_result(expr: Expr) -> Statement {
    SetResult(expr)
}

fn neighbor_count_in(counts: impl Iterator<Item = u32>) -> Expr {
    any_of(counts.map(|n| equal(neighbors(), u32(n))).collect())
}

/// The full per-cell transition for `rule` as a program over `state` and `num_neighbors`.
pub fn transition_program(rule: &RuleSpec) -> Statement {
    let survives = neighbor_count_in(rule.survive_counts());
    let born = neighbor_count_in(rule.birth_counts());

    if_then_else(
        equal(state(), u32(1)),
        if_then_else(
            survives,
            set_result(u32(1)),
            set_result(u32(rule.dying_state())),
        ),
        if_then_else(
            gt(state(), u32(2)),
            set_result(sub(state(), u32(1))),
            if_then_else(
                equal(state(), u32(2)),
                set_result(u32(0)),
                if_then_else(born, set_result(u32(1)), set_result(u32(0))),
            ),
        ),
    )
}
