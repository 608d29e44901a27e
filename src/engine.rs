//! Precision-parameterised Zielonka engine.
//!
//! Solves a subgame by recursive attractor decomposition. Each frame peels
//! the attractor of the top-priority vertices off the subgame, recurses into
//! the remainder, and re-attracts if the opponent retains a region. On top
//! of the classical recursion the engine carries a per-player *precision*
//! budget that bounds the nesting depth of opponent-side recursions, staged
//! over four modes:
//!
//! | Mode | Meaning |
//! |------|---------|
//! | `Reduced` | first pass, opponent precision reduced per level |
//! | `Full` | second pass over the same subgame at full precision |
//! | `ReducedAgain` | third pass after the opponent kept a region |
//! | `Classic` | plain Zielonka, precision never reduced |
//!
//! A frame whose budget runs out concedes its whole subgame with the
//! [`STRAT_WON`]/[`STRAT_NONE`] degenerate assignment; conceded regions are
//! always re-examined by an enclosing full-precision pass before they reach
//! the driver.
//!
//! ## Scratch arrays and category tags
//!
//! The engine owns three vertex-indexed scratch vectors (`vtype`,
//! `strategy`, `degs`), written in place by every recursion level. Frames
//! tell their vertices apart from a parent's not by clearing arrays but by
//! tagging them with globally fresh *categories* from a monotone counter:
//! a parent's tags can never equal a tag allocated later, so a frame only
//! ever sees its own markings. `degs` belongs to the attractor kernel and
//! is restored to -1 on every exit path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::*;
use crate::types::{Game, Vertex};

// ── Category allocator ──────────────────────────────────────────────

/// Monotone process-wide tag counter. Starts at 1 so that tag 0 is never
/// issued; freshly constructed engines use 0 as the "no frame owns this
/// vertex" marking.
static CATEGORY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh category tag. Tags are never reused.
pub(crate) fn new_category() -> u64 {
    let cat = CATEGORY_COUNTER.fetch_add(1, Ordering::Relaxed);
    assert!(cat != u64::MAX, "category tag space exhausted");
    cat
}

// ── Memoisation store ───────────────────────────────────────────────

/// Cache of engine results keyed by `(precision pair, subgame vertex list)`.
///
/// The vertex list is kept in the caller's order and the stored strategies
/// are positional, so keys compare by full structural equality and the list
/// is never sorted.
#[derive(Default)]
pub struct MemoStore {
    entries: HashMap<([i32; 2], Vec<Vertex>), Vec<i32>>,
}

impl MemoStore {
    /// Number of cached subgame results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Recursion staging. `Reduced` and `ReducedAgain` are the passes that
/// shrink the opponent's budget; `Full` re-runs a won subgame to validate
/// it; `Classic` disables the budget entirely.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    Reduced,
    Full,
    ReducedAgain,
    Classic,
}

/// The recursive solver. Holds a read-only view of the game plus the
/// engine-local scratch state; one instance serves one driver pass.
pub struct ZlkSolver<'a> {
    game: &'a Game,
    flags: u32,
    /// Category tag per vertex; 0 until some frame claims the vertex.
    vtype: Vec<u64>,
    /// Engine-local strategy slots (sentinels from [`crate::constants`]).
    strategy: Vec<i32>,
    /// Attractor scratch; -1 outside an attractor run.
    degs: Vec<i32>,
    /// Attractor BFS queue, reused across calls.
    aqueue: Vec<Vertex>,
    memo: MemoStore,
    iters: u64,
}

impl<'a> ZlkSolver<'a> {
    pub fn new(game: &'a Game, flags: u32) -> Self {
        let n = game.num_vertices();
        Self {
            game,
            flags,
            vtype: vec![0; n],
            strategy: vec![STRAT_UNSET; n],
            degs: vec![-1; n],
            aqueue: Vec::new(),
            memo: MemoStore::default(),
            iters: 0,
        }
    }

    /// Solve the subgame `vset` with the default precision budget for the
    /// game size. Strategies land in the engine-local slots, readable via
    /// [`ZlkSolver::strategy`] or [`ZlkSolver::into_strategy`].
    pub fn run(&mut self, vset: &[Vertex]) {
        self.run_with_precision(vset, initial_precision(self.game.num_vertices()));
    }

    /// Like [`ZlkSolver::run`] with an explicit per-player precision budget.
    /// A larger budget never shrinks a player's winning region.
    pub fn run_with_precision(&mut self, vset: &[Vertex], precision: i32) {
        let cat = new_category();
        for &v in vset {
            self.vtype[v as usize] = cat;
        }

        let mode = if self.flags & FLAG_ZIELONKA != 0 {
            Mode::Classic
        } else {
            Mode::Reduced
        };
        let mprio = if self.flags & FLAG_QUICK_PRIORITY != 0 {
            -1
        } else {
            vset.iter().map(|&v| self.game.priority(v)).max().unwrap_or(0)
        };

        self.iters = 0;
        self.zlk(vset, cat, [precision, precision], mode, mprio);
    }

    /// Engine-local strategy slot for `v`; a successor vertex when the
    /// owner of `v` wins, [`STRAT_NONE`] when the owner loses.
    #[inline(always)]
    pub fn strategy(&self, v: Vertex) -> i32 {
        self.strategy[v as usize]
    }

    /// Consume the engine and return the full strategy vector.
    pub fn into_strategy(self) -> Vec<i32> {
        self.strategy
    }

    /// Number of recursion frames entered by the last run.
    pub fn iterations(&self) -> u64 {
        self.iters
    }

    /// Number of memoised subgame results.
    pub fn memo_entries(&self) -> usize {
        self.memo.len()
    }

    /// Expand the `cat_yes` vertices of the subgame `vs` to their attractor
    /// for player `whose`, inside `vs` only.
    ///
    /// Precondition: `vtype[v]` is `cat_no` or `cat_yes` exactly for
    /// `v` in `vs`. On return every vertex from which `whose` can force the
    /// play into the seed set is tagged `cat_yes`, with a witness move in
    /// `strategy` for the vertices `whose` owns. `degs` is -1 again for all
    /// of `vs`.
    fn attract(&mut self, vs: &[Vertex], whose: i32, cat_no: u64, cat_yes: u64) {
        let g = self.game;

        self.aqueue.clear();
        for &v in vs {
            if self.vtype[v as usize] == cat_yes {
                self.aqueue.push(v);
            } else if g.owner(v) == whose {
                // one successor into the target suffices
                self.degs[v as usize] = 1;
            } else {
                let mut d = 0;
                for &w in g.successors(v) {
                    let t = self.vtype[w as usize];
                    if t == cat_no || t == cat_yes {
                        d += 1;
                    }
                }
                self.degs[v as usize] = d;
            }
        }

        // degs[v] counts the successors of v still to be proven winning for
        // `whose`; v joins the attractor when the count hits zero.
        let mut i = 0;
        while i < self.aqueue.len() {
            let v = self.aqueue[i];
            i += 1;
            for &u in g.predecessors(v) {
                self.degs[u as usize] -= 1;
                if self.degs[u as usize] == 0 {
                    self.vtype[u as usize] = cat_yes;
                    self.strategy[u as usize] = if g.owner(u) == whose { v } else { STRAT_NONE };
                    self.aqueue.push(u);
                }
            }
        }

        for &v in vs {
            self.degs[v as usize] = -1;
        }
    }

    /// One recursion frame over the subgame `vs`.
    ///
    /// Precondition: `vtype[v] == cat_base` exactly for `v` in `vs`. On
    /// return `strategy[v]` is written for every `v` in `vs` and nothing
    /// outside `vs` has changed.
    fn zlk(&mut self, vs: &[Vertex], cat_base: u64, precision: [i32; 2], mode: Mode, mprio: i32) {
        if self.flags & FLAG_MEMOIZE != 0 {
            let key = (precision, vs.to_vec());
            if let Some(hit) = self.memo.entries.get(&key) {
                for (i, &v) in vs.iter().enumerate() {
                    self.strategy[v as usize] = hit[i];
                }
                return;
            }
        }
        self.iters += 1;
        if vs.is_empty() {
            return;
        }

        let g = self.game;

        let maxprio = if mprio >= 0 {
            mprio
        } else {
            vs.iter().map(|&v| g.priority(v)).max().unwrap()
        };
        let us = parity(maxprio);
        let opponent = us ^ 1;

        // Budget for our side exhausted: concede the whole subgame.
        if precision[us as usize] <= 0 {
            for &v in vs {
                self.strategy[v as usize] = if g.owner(v) == us { STRAT_NONE } else { STRAT_WON };
            }
            return;
        }

        let cat_hiprio = new_category();
        for &v in vs {
            if g.priority(v) == maxprio {
                self.vtype[v as usize] = cat_hiprio;
                self.strategy[v as usize] = STRAT_UNSET;
            }
        }
        self.attract(vs, us, cat_base, cat_hiprio);

        let mut subprecision = precision;
        if mode == Mode::Reduced || mode == Mode::ReducedAgain {
            subprecision[opponent as usize] -= 1;
        }

        let subgame: Vec<Vertex> = vs
            .iter()
            .copied()
            .filter(|&v| self.vtype[v as usize] == cat_base)
            .collect();

        if subprecision[opponent as usize] == 0 {
            // Opponent's budget exhausted: degenerate win for us on all of vs.
            for &v in vs {
                self.strategy[v as usize] = if g.owner(v) == us { STRAT_WON } else { STRAT_NONE };
            }
        } else {
            let submode = if mode == Mode::Classic { Mode::Classic } else { Mode::Reduced };
            self.zlk(&subgame, cat_base, subprecision, submode, mprio - 1);
        }

        // Classify the remainder: the opponent wins from v iff our player
        // has no move there (owner us, lost) or the opponent has one
        // (owner opponent, won).
        let cat_opponent_wins = new_category();
        let mut subgame_won = true;
        for &v in &subgame {
            let opp_wins = if g.owner(v) == us {
                self.strategy[v as usize] == STRAT_NONE
            } else {
                self.strategy[v as usize] >= 0
            };
            if opp_wins {
                self.vtype[v as usize] = cat_opponent_wins;
                subgame_won = false;
            } else {
                self.vtype[v as usize] = cat_hiprio;
            }
        }

        if subgame_won {
            if mode == Mode::Reduced {
                // Reduced pass claims the whole subgame: validate with a
                // second pass at full precision.
                self.zlk(vs, cat_hiprio, precision, Mode::Full, mprio);
                return;
            }

            // Top-priority vertices still carry STRAT_UNSET; pick any edge
            // that stays inside the won region.
            for &v in vs {
                if g.priority(v) == maxprio {
                    if g.owner(v) == us {
                        for &e in g.successors(v) {
                            if self.vtype[e as usize] == cat_hiprio {
                                self.strategy[v as usize] = e;
                            }
                        }
                    } else {
                        self.strategy[v as usize] = STRAT_NONE;
                    }
                }
            }

            self.save_memo(precision, vs);
            return;
        }

        // The opponent kept a region: grow it by attraction and re-solve
        // what is left of ours.
        self.attract(vs, opponent, cat_hiprio, cat_opponent_wins);

        let subgame: Vec<Vertex> = vs
            .iter()
            .copied()
            .filter(|&v| self.vtype[v as usize] == cat_hiprio)
            .collect();

        let submode = if mode == Mode::Full { Mode::ReducedAgain } else { mode };
        self.zlk(&subgame, cat_hiprio, precision, submode, mprio);

        self.save_memo(precision, vs);
    }

    fn save_memo(&mut self, precision: [i32; 2], vs: &[Vertex]) {
        if self.flags & FLAG_MEMOIZE != 0 {
            let strat: Vec<i32> = vs.iter().map(|&v| self.strategy[v as usize]).collect();
            self.memo.entries.insert((precision, vs.to_vec()), strat);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_monotone() {
        let a = new_category();
        let b = new_category();
        let c = new_category();
        assert!(a < b && b < c);
    }

    /// owner-0 diamond: 0 -> {1, 2}, 1 -> 1, 2 -> 2.
    fn diamond() -> Game {
        let mut g = Game::new(3);
        g.init_vertex(0, 0, 1);
        g.init_vertex(1, 1, 0);
        g.init_vertex(2, 0, 0);
        g.add_edge(0, 1);
        g.add_edge(0, 2);
        g.add_edge(1, 1);
        g.add_edge(2, 2);
        g
    }

    #[test]
    fn test_attract_pulls_controlled_vertex() {
        let g = diamond();
        let mut e = ZlkSolver::new(&g, 0);
        let vs = [0, 1, 2];
        let cat_no = new_category();
        let cat_yes = new_category();
        for &v in &vs {
            e.vtype[v as usize] = cat_no;
        }
        e.vtype[1] = cat_yes;

        e.attract(&vs, 0, cat_no, cat_yes);

        // vertex 0 (owner 0) can move into the target, vertex 2 cannot reach it
        assert_eq!(e.vtype[0], cat_yes);
        assert_eq!(e.strategy[0], 1);
        assert_eq!(e.vtype[2], cat_no);
        assert!(e.degs.iter().all(|&d| d == -1));
    }

    #[test]
    fn test_attract_idempotent() {
        let g = diamond();
        let mut e = ZlkSolver::new(&g, 0);
        let vs = [0, 1, 2];
        let cat_no = new_category();
        let cat_yes = new_category();
        for &v in &vs {
            e.vtype[v as usize] = cat_no;
        }
        e.vtype[1] = cat_yes;

        e.attract(&vs, 0, cat_no, cat_yes);
        let vtype_once = e.vtype.clone();
        let strategy_once = e.strategy.clone();

        e.attract(&vs, 0, cat_no, cat_yes);
        assert_eq!(e.vtype, vtype_once);
        assert_eq!(e.strategy, strategy_once);
    }

    #[test]
    fn test_forced_escape_not_attracted() {
        // opponent-owned vertex with an escape edge stays out of the attractor
        let mut g = Game::new(3);
        g.init_vertex(0, 1, 0);
        g.init_vertex(1, 0, 0);
        g.init_vertex(2, 0, 0);
        g.add_edge(0, 1);
        g.add_edge(0, 2);
        g.add_edge(1, 1);
        g.add_edge(2, 2);
        let mut e = ZlkSolver::new(&g, 0);
        let vs = [0, 1, 2];
        let cat_no = new_category();
        let cat_yes = new_category();
        for &v in &vs {
            e.vtype[v as usize] = cat_no;
        }
        e.vtype[1] = cat_yes;

        e.attract(&vs, 0, cat_no, cat_yes);
        // vertex 0 is owned by player 1 and can escape to 2
        assert_eq!(e.vtype[0], cat_no);
    }

    #[test]
    fn test_engine_two_sinks() {
        // 0 chooses between an even loop (1) and an odd loop (2)
        let mut g = Game::new(3);
        g.init_vertex(0, 0, 1);
        g.init_vertex(1, 0, 0);
        g.init_vertex(2, 0, 3);
        g.add_edge(0, 1);
        g.add_edge(0, 2);
        g.add_edge(1, 1);
        g.add_edge(2, 2);

        let mut e = ZlkSolver::new(&g, 0);
        e.run(&[0, 1, 2]);

        // player 0 wins 0 and 1 via the even loop, loses 2
        assert_eq!(e.strategy(0), 1);
        assert!(e.strategy(1) >= 0);
        assert_eq!(e.strategy(2), STRAT_NONE);
    }

    #[test]
    fn test_engine_odd_cycle() {
        // two-vertex cycle with top priority odd: player 1 wins everything
        let mut g = Game::new(2);
        g.init_vertex(0, 0, 2);
        g.init_vertex(1, 1, 3);
        g.add_edge(0, 1);
        g.add_edge(1, 0);

        let mut e = ZlkSolver::new(&g, 0);
        e.run(&[0, 1]);

        // owner 0 loses vertex 0, owner 1 wins vertex 1
        assert_eq!(e.strategy(0), STRAT_NONE);
        assert_eq!(e.strategy(1), 0);
    }

    #[test]
    fn test_classic_matches_staged() {
        let mut g = Game::new(4);
        g.init_vertex(0, 0, 4);
        g.init_vertex(1, 1, 3);
        g.init_vertex(2, 0, 2);
        g.init_vertex(3, 1, 1);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(2, 3);
        g.add_edge(3, 0);
        g.add_edge(1, 0);
        g.add_edge(3, 2);

        let vs = [0, 1, 2, 3];
        let mut staged = ZlkSolver::new(&g, 0);
        staged.run(&vs);
        let mut classic = ZlkSolver::new(&g, FLAG_ZIELONKA);
        classic.run(&vs);

        for &v in &vs {
            let staged_owner_wins = staged.strategy(v) >= 0;
            let classic_owner_wins = classic.strategy(v) >= 0;
            assert_eq!(staged_owner_wins, classic_owner_wins, "vertex {}", v);
        }
    }
}
