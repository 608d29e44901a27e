//! Driver: owns the game, runs the engine to a fixpoint, and propagates
//! solved regions.
//!
//! The driver keeps a `disabled` mask (vertices hidden from the engine), an
//! `outcount` array (enabled out-degree, used to detect forced vertices
//! during flush) and a `todo` queue of freshly solved vertices. Each round
//! of [`Driver::solve_loop`] hides everything already solved, hands the
//! remainder (optionally restricted to one bottom SCC) to the engine,
//! commits the engine's verdict through the [`Driver::solve`] sink, and
//! flushes. Flushing walks the *original* in-edges, so attraction crosses
//! regions a later engine pass would no longer see.
//!
//! All decisions funnel through the single sink `solve(v, winner, choice)`;
//! solving a vertex twice is a [`LogicError`] and aborts the solve.

use std::collections::VecDeque;
use std::time::Instant;

use crate::constants::*;
use crate::engine::ZlkSolver;
use crate::env_config;
use crate::types::{Game, LogicError, Vertex};

/// Driver knobs. The `flags` word goes to the engine verbatim.
#[derive(Clone, Copy, Debug)]
pub struct DriverOptions {
    /// Engine flag bits (`FLAG_*` in [`crate::constants`]).
    pub flags: u32,
    /// Restrict each engine pass to one bottom SCC of the remaining graph.
    pub bottom_scc: bool,
    /// Run the self-loop pre-reduction.
    pub remove_loops: bool,
    /// Run the winner-controlled winning cycle (SCC) pre-reduction.
    pub remove_wcwc: bool,
    /// Try the single-parity shortcut before anything else.
    pub solve_single: bool,
    /// Host the solve loop on a worker pool of this size. The core stays
    /// single-threaded either way.
    pub workers: Option<usize>,
    /// Print per-decision detail.
    pub trace: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            flags: 0,
            bottom_scc: false,
            remove_loops: true,
            remove_wcwc: true,
            solve_single: false,
            workers: None,
            trace: false,
        }
    }
}

impl DriverOptions {
    /// Defaults with `trace` and `workers` taken from the environment
    /// (see [`crate::env_config`]).
    pub fn from_env() -> Self {
        Self {
            trace: env_config::trace_enabled(),
            workers: env_config::worker_threads(),
            ..Self::default()
        }
    }
}

/// Solve orchestrator. Construct with a game, call [`Driver::run`], then
/// read results back from the game.
pub struct Driver {
    pub(crate) game: Game,
    pub(crate) opts: DriverOptions,
    /// Vertices hidden from the engine this round.
    pub(crate) disabled: Vec<bool>,
    /// Enabled out-degree per vertex; -1 once the vertex has been flushed.
    pub(crate) outcount: Vec<i32>,
    /// Freshly solved vertices awaiting flush.
    pub(crate) todo: VecDeque<Vertex>,
}

impl Driver {
    pub fn new(game: Game, opts: DriverOptions) -> Self {
        let n = game.num_vertices();
        let outcount = (0..n).map(|v| game.out_degree(v as Vertex) as i32).collect();
        Self {
            game,
            opts,
            disabled: vec![false; n],
            outcount,
            todo: VecDeque::new(),
        }
    }

    /// The solved game, for reading results.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Consume the driver and return the game.
    pub fn into_game(self) -> Game {
        self.game
    }

    /// The single decision sink: record that `win` wins vertex `v`, with
    /// `strategy` as the witness move when `win` owns `v`. Marks `v`
    /// disabled and queues it for the next flush.
    pub fn solve(&mut self, v: Vertex, win: i32, strategy: i32) -> Result<(), LogicError> {
        if self.game.is_solved(v) || self.disabled[v as usize] {
            return Err(LogicError::AlreadySolved(v));
        }
        if self.opts.trace {
            println!(
                "solved vertex {} (priority {}) for player {}",
                v,
                self.game.priority(v),
                win
            );
        }
        self.game.mark_solved(v, win, strategy);
        self.disabled[v as usize] = true;
        self.todo.push_back(v);
        Ok(())
    }

    /// Drain the todo queue, extending the solved region backwards over the
    /// original in-edges: a predecessor owned by the winner is attracted
    /// with the popped vertex as witness; any other predecessor is solved
    /// without a move once its last enabled out-edge is consumed.
    ///
    /// Deliberately ignores `disabled`, so attraction reaches vertices the
    /// engine was not shown (e.g. outside the current bottom SCC).
    pub fn flush(&mut self) {
        while let Some(v) = self.todo.pop_front() {
            if self.outcount[v as usize] == -1 {
                continue; // already flushed
            }
            self.outcount[v as usize] = -1;

            debug_assert!(self.game.is_solved(v));
            let winner = self.game.winner(v);

            let deg = self.game.in_degree(v);
            for k in 0..deg {
                let u = self.game.predecessors(v)[k];
                if self.game.is_solved(u) {
                    continue;
                }
                if self.game.owner(u) == winner {
                    self.game.mark_solved(u, winner, v);
                    self.disabled[u as usize] = true;
                    self.todo.push_back(u);
                } else {
                    self.outcount[u as usize] -= 1;
                    if self.outcount[u as usize] == 0 {
                        self.game.mark_solved(u, winner, STRAT_NONE);
                        self.disabled[u as usize] = true;
                        self.todo.push_back(u);
                    }
                }
            }
        }
    }

    /// One bottom SCC of the enabled subgraph: a strongly connected
    /// component with no edge into another enabled component. Iterative
    /// Tarjan; the first component completed is a bottom one.
    pub(crate) fn bottom_scc(&self) -> Vec<Vertex> {
        let n = self.game.num_vertices();
        let start = match (0..n).find(|&v| !self.disabled[v]) {
            Some(v) => v as Vertex,
            None => return Vec::new(),
        };

        const UNSEEN: i32 = -1;
        let mut index = vec![UNSEEN; n];
        let mut lowlink = vec![0i32; n];
        let mut next_index = 0i32;
        let mut stack: Vec<Vertex> = Vec::new();
        // (vertex, next successor position to examine)
        let mut call: Vec<(Vertex, usize)> = vec![(start, 0)];

        while !call.is_empty() {
            // scan the frame on top; release the borrow before push/pop
            let (v, child) = {
                let top = call.last_mut().unwrap();
                let v = top.0;
                if top.1 == 0 {
                    index[v as usize] = next_index;
                    lowlink[v as usize] = next_index;
                    next_index += 1;
                    stack.push(v);
                }
                let mut child = None;
                while top.1 < self.game.out_degree(v) {
                    let w = self.game.successors(v)[top.1];
                    top.1 += 1;
                    if self.disabled[w as usize] {
                        continue;
                    }
                    if index[w as usize] == UNSEEN {
                        child = Some(w);
                        break;
                    }
                    // every seen vertex is still on the stack here, since we
                    // stop at the first completed component
                    if lowlink[w as usize] < lowlink[v as usize] {
                        lowlink[v as usize] = lowlink[w as usize];
                    }
                }
                (v, child)
            };

            if let Some(w) = child {
                call.push((w, 0));
                continue;
            }

            call.pop();
            if let Some(top) = call.last() {
                let p = top.0;
                if lowlink[v as usize] < lowlink[p as usize] {
                    lowlink[p as usize] = lowlink[v as usize];
                }
            }
            if lowlink[v as usize] == index[v as usize] {
                // root of the first completed component: it has no edges
                // into any other enabled component, so it is a bottom SCC
                let mut scc = Vec::new();
                while let Some(w) = stack.pop() {
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                return scc;
            }
        }
        Vec::new()
    }

    /// Repeatedly invoke the engine on the remaining subgame until every
    /// vertex is solved.
    pub fn solve_loop(&mut self) -> Result<(), LogicError> {
        let n = self.game.num_vertices();

        while !self.game.game_solved() {
            for v in 0..n {
                self.disabled[v] = self.game.is_solved(v as Vertex);
            }

            let vset: Vec<Vertex> = if self.opts.bottom_scc {
                let sel = self.bottom_scc();
                debug_assert!(!sel.is_empty());
                for v in 0..n {
                    self.disabled[v] = true;
                }
                for &v in &sel {
                    self.disabled[v as usize] = false;
                }
                println!(
                    "solving bottom SCC of {} vertices ({} vertices left)",
                    sel.len(),
                    self.game.count_unsolved()
                );
                sel
            } else {
                (0..n)
                    .filter(|&v| !self.disabled[v])
                    .map(|v| v as Vertex)
                    .collect()
            };

            let (strategy, iters) = {
                let mut engine = ZlkSolver::new(&self.game, self.opts.flags);
                engine.run(&vset);
                let iters = engine.iterations();
                (engine.into_strategy(), iters)
            };
            if self.opts.trace {
                println!("engine pass over {} vertices took {} frames", vset.len(), iters);
            }

            for &v in &vset {
                let s = strategy[v as usize];
                let owner = self.game.owner(v);
                if s >= 0 {
                    self.solve(v, owner, s)?;
                } else {
                    self.solve(v, 1 - owner, STRAT_NONE)?;
                }
            }

            self.flush();

            if !self.opts.bottom_scc {
                println!("{} vertices left.", self.game.count_unsolved());
            }
        }
        Ok(())
    }

    /// Full solve: pre-reductions, then the engine loop (hosted on a worker
    /// pool when configured). On return every vertex is solved.
    pub fn run(&mut self) -> Result<(), LogicError> {
        let start = Instant::now();

        if self.opts.solve_single && self.solve_single_parity()? {
            println!("solved in {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);
            return Ok(());
        }

        if self.opts.remove_loops {
            let count = self.solve_selfloops()?;
            match count {
                0 => println!("no self-loops removed"),
                1 => println!("1 self-loop removed"),
                c => println!("{} self-loops removed", c),
            }
        }

        if self.opts.remove_wcwc {
            let count = self.solve_trivial_cycles()?;
            match count {
                0 => println!("no trivial cycles removed"),
                1 => println!("1 trivial cycle removed"),
                c => println!("{} trivial cycles removed", c),
            }
        }

        if !self.game.game_solved() {
            match self.opts.workers {
                Some(workers) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(workers)
                        .build()
                        .expect("failed to build worker pool");
                    println!("running on a pool of {} workers", workers);
                    pool.install(|| self.solve_loop())?;
                }
                None => self.solve_loop()?,
            }
        }

        println!("solved in {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }
}
