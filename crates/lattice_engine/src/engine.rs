//! # Engine
//!
//! Drives a [`ComputationNode`] tree to a single matrix leaf.
//!
//! Two operand slots are reused for every node: `left` receives child 0
//! row-major and holds the result, `right` receives child 1 (row-major for
//! ADD, column-major for MULTIPLY). Both are reloaded only between batches,
//! never while row tasks still reference them.
//!
//! | Operator  | left        | right        | row task                     |
//! |-----------|-------------|--------------|------------------------------|
//! | ADD       | row-major   | row-major    | `left[i].add(right[i])`      |
//! | MULTIPLY  | row-major   | column-major | `left[i].mat_mul_into(right)`|
//! | NEGATE    | row-major   | -            | `left[i].negate()`           |
//! | TRANSPOSE | row-major   | -            | `left[i].transpose()`        |

use std::sync::Arc;
use std::time::Instant;

use lattice_core::{MemoryResult, RawMatrix, SharedMatrix};
use lattice_scheduler::Pool;

use crate::config::EngineConfig;
use crate::dag::{ComputationNode, Operator};
use crate::error::{EngineError, EngineResult};

/// Outcome of [`Engine::evaluate`].
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// The resolved matrix, or why it could not be computed.
    pub result: EngineResult<RawMatrix>,
    /// Worker report taken after the run, success or not.
    pub report: String,
}

/// Row-parallel evaluator for matrix expression trees.
pub struct Engine {
    left: Arc<SharedMatrix>,
    right: Arc<SharedMatrix>,
    pool: Pool,
}

impl Engine {
    /// Starts an engine with `threads` workers and default settings.
    ///
    /// # Errors
    ///
    /// Fails for zero threads or if a worker cannot be spawned.
    pub fn new(threads: usize) -> EngineResult<Self> {
        Self::with_config(&EngineConfig::with_workers(threads))
    }

    /// Starts an engine from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for invalid settings and
    /// [`EngineError::Scheduler`] if the pool cannot start.
    pub fn with_config(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::with_pool(Pool::with_config(&config.pool)?))
    }

    /// Wraps an already started pool.
    #[must_use]
    pub fn with_pool(pool: Pool) -> Self {
        Self {
            left: Arc::new(SharedMatrix::new()),
            right: Arc::new(SharedMatrix::new()),
            pool,
        }
    }

    /// Rewrites `root` and resolves it in place until it is a matrix leaf.
    ///
    /// # Errors
    ///
    /// Fails on a malformed tree, incompatible operand shapes, or a failed
    /// batch. The failing node stays unresolved; nodes resolved before it
    /// keep their results.
    pub fn run(&self, root: &mut ComputationNode) -> EngineResult<()> {
        if root.is_leaf() {
            return Ok(());
        }
        root.associative_nesting()?;

        while let Some(node) = root.find_resolvable() {
            self.load_and_compute(node)?;
        }
        Ok(())
    }

    /// Runs `root` and never panics: failures land in
    /// [`Evaluation::result`]. The worker report is always captured.
    pub fn evaluate(&self, root: &mut ComputationNode) -> Evaluation {
        let started = Instant::now();
        let result = self.run(root).and_then(|()| {
            root.as_matrix()
                .cloned()
                .ok_or_else(|| EngineError::Structure("root did not resolve to a matrix".into()))
        });

        match &result {
            Ok(matrix) => tracing::info!(
                rows = matrix.len(),
                cols = matrix.first().map_or(0, Vec::len),
                elapsed = ?started.elapsed(),
                "evaluation finished"
            ),
            Err(e) => tracing::error!(error = %e, "evaluation failed"),
        }

        Evaluation {
            result,
            report: self.pool.report(),
        }
    }

    /// Computes one resolvable node and collapses it into a matrix leaf.
    ///
    /// A leaf is left as is.
    ///
    /// # Errors
    ///
    /// Fails if the child count does not match the operator, a child is not
    /// a leaf, the operands are empty or have incompatible shapes, or the
    /// batch fails.
    pub fn load_and_compute(&self, node: &mut ComputationNode) -> EngineResult<()> {
        let ComputationNode::Operation { op, children } = node else {
            return Ok(());
        };
        let op = *op;

        match op {
            Operator::Add => {
                let [a, b] = operands::<2>(op, children)?;
                self.left.load_row_major(a)?;
                self.right.load_row_major(b)?;
                let (rows, cols) = loaded_shape(op, &self.left)?;
                let right_shape = loaded_shape(op, &self.right)?;
                if (rows, cols) != right_shape {
                    return Err(EngineError::Shape(format!(
                        "{op} of {rows}x{cols} and {}x{}",
                        right_shape.0, right_shape.1
                    )));
                }
                self.dispatch(op, rows, |left, right, row| {
                    move || -> MemoryResult<()> { left.get(row)?.add(&*right.get(row)?) }
                })?;
            }
            Operator::Multiply => {
                let [a, b] = operands::<2>(op, children)?;
                self.left.load_row_major(a)?;
                self.right.load_column_major(b)?;
                let (rows, cols) = loaded_shape(op, &self.left)?;
                let right_shape = loaded_shape(op, &self.right)?;
                if cols != right_shape.0 {
                    return Err(EngineError::Shape(format!(
                        "{op} of {rows}x{cols} and {}x{}",
                        right_shape.0, right_shape.1
                    )));
                }
                self.dispatch(op, rows, |left, right, row| {
                    move || -> MemoryResult<()> { left.get(row)?.mat_mul_into(&right) }
                })?;
            }
            Operator::Negate => {
                let [a] = operands::<1>(op, children)?;
                self.left.load_row_major(a)?;
                let (rows, _) = loaded_shape(op, &self.left)?;
                self.dispatch(op, rows, |left, _, row| {
                    move || -> MemoryResult<()> {
                        left.get(row)?.negate();
                        Ok(())
                    }
                })?;
            }
            Operator::Transpose => {
                let [a] = operands::<1>(op, children)?;
                self.left.load_row_major(a)?;
                let (rows, _) = loaded_shape(op, &self.left)?;
                // Flipping every row's tag is enough: reading back row-major
                // transposes a column-major matrix.
                self.dispatch(op, rows, |left, _, row| {
                    move || -> MemoryResult<()> {
                        left.get(row)?.transpose();
                        Ok(())
                    }
                })?;
            }
        }

        node.resolve(self.left.read_row_major()?);
        Ok(())
    }

    /// Worker report string.
    #[must_use]
    pub fn worker_report(&self) -> String {
        self.pool.report()
    }

    /// The pool running the row tasks.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Stops the pool. Later runs fail with a scheduler error.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Builds one task per row and runs them as a single batch.
    fn dispatch<F, T>(&self, op: Operator, rows: usize, make_task: F) -> EngineResult<()>
    where
        F: Fn(Arc<SharedMatrix>, Arc<SharedMatrix>, usize) -> T,
        T: FnOnce() -> MemoryResult<()> + Send + 'static,
    {
        tracing::debug!(%op, rows, "dispatching row batch");
        let tasks = (0..rows)
            .map(|row| make_task(Arc::clone(&self.left), Arc::clone(&self.right), row));
        self.pool.submit_all(tasks)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Returns the shape of a loaded operand, failing if it has no elements.
fn loaded_shape(op: Operator, matrix: &SharedMatrix) -> EngineResult<(usize, usize)> {
    let (rows, cols) = matrix.shape();
    if rows == 0 || cols == 0 {
        return Err(EngineError::Shape(format!("{op} of an empty matrix")));
    }
    Ok((rows, cols))
}

/// Checks the child count and returns the children's matrices.
fn operands<const N: usize>(
    op: Operator,
    children: &[ComputationNode],
) -> EngineResult<[&RawMatrix; N]> {
    if children.len() != N {
        return Err(EngineError::Structure(format!(
            "{op} needs exactly {N} operand(s) here, found {}",
            children.len()
        )));
    }
    let matrices = children
        .iter()
        .map(|child| {
            child.as_matrix().ok_or_else(|| {
                EngineError::Structure(format!("{op} operand is not resolved yet"))
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    <[&RawMatrix; N]>::try_from(matrices)
        .map_err(|_| EngineError::Structure(format!("{op} operand count changed")))
}
