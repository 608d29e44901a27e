//! Pre-reductions: cheap passes that decide vertices before the engine runs.
//!
//! Three reductions, all committed through the driver's solve sink and
//! followed by a flush so attraction extends each find through the original
//! in-edges:
//!
//! - [`Driver::solve_selfloops`]: a self-loop whose priority parity matches
//!   its owner is an immediate win; a losing self-loop on a vertex with no
//!   other move is a dominion for the opponent; any other losing self-loop
//!   is physically removed from the graph.
//! - [`Driver::solve_trivial_cycles`]: scans, per priority from high to
//!   low, the subgraph of same-owner vertices with priority at most the
//!   current one. Every SCC there whose top priority has the owner's parity
//!   is a winner-controlled winning cycle and gets solved by a backward
//!   search from its top vertex.
//! - [`Driver::solve_single_parity`]: if every remaining priority has the
//!   same parity, that player wins everything with any enabled move.

use std::collections::VecDeque;

use crate::constants::*;
use crate::driver::Driver;
use crate::types::{LogicError, Vertex};

impl Driver {
    /// Resolve or remove every self-loop. Returns the number of self-loops
    /// handled.
    pub fn solve_selfloops(&mut self) -> Result<u32, LogicError> {
        let n = self.game.num_vertices();
        let mut res = 0;

        for v in 0..n as Vertex {
            if self.disabled[v as usize] {
                continue;
            }
            if !self.game.successors(v).contains(&v) {
                continue;
            }

            let owner = self.game.owner(v);
            if owner == parity(self.game.priority(v)) {
                if self.opts.trace {
                    println!(
                        "winning self-loop with priority {}",
                        self.game.priority(v)
                    );
                }
                self.solve(v, owner, v)?;
            } else if self.game.out_degree(v) == 1 {
                // no way out of a losing loop: a dominion for the opponent
                self.solve(v, 1 - owner, STRAT_NONE)?;
            } else {
                self.game.remove_self_loop(v);
                self.outcount[v as usize] -= 1;
            }
            res += 1;
        }

        self.flush();
        Ok(res)
    }

    /// Find and solve winner-controlled winning cycles. Returns the number
    /// of cycles solved.
    pub fn solve_trivial_cycles(&mut self) -> Result<u32, LogicError> {
        let n = self.game.num_vertices();
        let mut count = 0;

        // done[v]: -2 never look again, -1 unseen, otherwise the priority of
        // the scan that last visited v
        let mut done: Vec<i32> = (0..n)
            .map(|v| if self.disabled[v] { -2 } else { -1 })
            .collect();
        // DFS preorder numbers; entries at most `bot` count as unseen for
        // the current scan, so the array never needs clearing
        let mut low: Vec<i64> = vec![0; n];
        let mut pre: i64 = 0;

        let mut res: Vec<Vertex> = Vec::new();
        let mut scc: Vec<Vertex> = Vec::new();
        let mut st: Vec<Vertex> = Vec::new();
        let mut queue: VecDeque<Vertex> = VecDeque::new();

        // scan roots in descending priority order
        let mut order: Vec<Vertex> = (0..n as Vertex).collect();
        order.sort_unstable_by(|&a, &b| {
            (self.game.priority(b), b).cmp(&(self.game.priority(a), a))
        });

        for &root in &order {
            if self.disabled[root as usize] {
                continue;
            }
            if done[root as usize] == -2 {
                continue;
            }

            let pr = self.game.priority(root);
            let pl = parity(pr);

            if self.game.owner(root) != pl {
                // not winner-controlled at its own priority: never a root
                done[root as usize] = -2;
                continue;
            }
            if done[root as usize] == pr {
                continue; // already swept in this priority's scan
            }

            let bot = pre;
            st.push(root);

            while let Some(&idx) = st.last() {
                if low[idx as usize] <= bot {
                    pre += 1;
                    if pre < 0 {
                        return Err(LogicError::DfsCounterOverflow);
                    }
                    low[idx as usize] = pre;
                    res.push(idx);
                }

                // follow edges to same-owner vertices of priority <= pr not
                // yet seen in this scan
                let mut min = low[idx as usize];
                let mut pushed = false;
                let deg = self.game.out_degree(idx);
                for k in 0..deg {
                    let to = self.game.successors(idx)[k];
                    if self.disabled[to as usize] {
                        continue;
                    }
                    if self.game.priority(to) > pr
                        || done[to as usize] == -2
                        || done[to as usize] == pr
                        || self.game.owner(to) != pl
                    {
                        continue;
                    }
                    if low[to as usize] <= bot {
                        st.push(to);
                        pushed = true;
                        break;
                    } else if low[to as usize] < min {
                        min = low[to as usize];
                    }
                }
                if pushed {
                    continue;
                }

                if min < low[idx as usize] {
                    // not a component root yet
                    low[idx as usize] = min;
                    st.pop();
                    continue;
                }

                // idx roots a component: move it from res to scc, recording
                // the top priority and the top vertex of the right parity
                let mut max_pr = -1;
                let mut max_pr_pl = -1;
                let mut max_pr_n: Vertex = -1;
                loop {
                    let v = res.pop().ok_or(LogicError::SccStackUnderflow)?;
                    scc.push(v);
                    done[v as usize] = pr;
                    if low[v as usize] != min {
                        low[v as usize] = min;
                    }
                    let d = self.game.priority(v);
                    if d > max_pr {
                        max_pr = d;
                    }
                    if parity(d) == pl && d > max_pr_pl {
                        max_pr_pl = d;
                        max_pr_n = v;
                    }
                    if v == idx {
                        break;
                    }
                }

                // a single vertex without a self-loop is no cycle at all
                if scc.len() == 1 && !self.game.successors(idx).contains(&idx) {
                    done[idx as usize] = -2;
                    scc.clear();
                    st.pop();
                    continue;
                }

                if parity(max_pr) != pl {
                    // the cycle's top priority belongs to the opponent; the
                    // component will be rediscovered at lower priorities
                    // without its offending members
                    for &v in &scc {
                        if self.game.priority(v) > max_pr_pl {
                            done[v as usize] = -2;
                        }
                    }
                    scc.clear();
                    st.pop();
                    continue;
                }

                if self.opts.trace {
                    println!("winner-controlled cycle with win priority {}", max_pr);
                }

                // solve the component by backward search from its top vertex
                queue.push_back(max_pr_n);
                while let Some(cur) = queue.pop_front() {
                    let deg = self.game.in_degree(cur);
                    for k in 0..deg {
                        let from = self.game.predecessors(cur)[k];
                        if low[from as usize] != min || self.disabled[from as usize] {
                            continue;
                        }
                        self.solve(from, pl, cur)?;
                        queue.push_back(from);
                    }
                }
                self.flush();

                // everything still on the DFS stack reaches the solved
                // component under the winner's control, so flush took it
                st.clear();
                res.clear();
                scc.clear();
                count += 1;
            }
        }

        Ok(count)
    }

    /// Solve the whole remaining game when only one priority parity is
    /// left. Returns false (and does nothing) when both parities occur.
    pub fn solve_single_parity(&mut self) -> Result<bool, LogicError> {
        let n = self.game.num_vertices();

        let mut game_parity = -1;
        for v in 0..n as Vertex {
            if self.disabled[v as usize] {
                continue;
            }
            let p = parity(self.game.priority(v));
            if game_parity == -1 {
                game_parity = p;
            } else if game_parity != p {
                return Ok(false);
            }
        }
        if game_parity < 0 {
            return Ok(false); // everything disabled
        }

        println!(
            "parity game only has parity {}",
            if game_parity == 1 { "odd" } else { "even" }
        );
        for v in 0..n as Vertex {
            if self.disabled[v as usize] {
                continue;
            }
            if self.game.owner(v) == game_parity {
                let deg = self.game.out_degree(v);
                for k in 0..deg {
                    let to = self.game.successors(v)[k];
                    if self.disabled[to as usize] {
                        continue;
                    }
                    self.solve(v, game_parity, to)?;
                    break;
                }
            } else {
                self.solve(v, game_parity, STRAT_NONE)?;
            }
        }
        self.flush();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverOptions;
    use crate::types::Game;

    #[test]
    fn test_winning_selfloop() {
        let mut g = Game::new(1);
        g.init_vertex(0, 1, 3);
        g.add_edge(0, 0);
        let mut d = Driver::new(g, DriverOptions::default());
        assert_eq!(d.solve_selfloops().unwrap(), 1);
        assert!(d.game().is_solved(0));
        assert_eq!(d.game().winner(0), 1);
        assert_eq!(d.game().strategy(0), 0);
    }

    #[test]
    fn test_losing_selfloop_dominion() {
        let mut g = Game::new(1);
        g.init_vertex(0, 0, 1);
        g.add_edge(0, 0);
        let mut d = Driver::new(g, DriverOptions::default());
        d.solve_selfloops().unwrap();
        assert!(d.game().is_solved(0));
        assert_eq!(d.game().winner(0), 1);
        assert_eq!(d.game().strategy(0), STRAT_NONE);
    }

    #[test]
    fn test_losing_selfloop_removed() {
        // vertex 0 has a losing self-loop and an escape, so only the edge goes
        let mut g = Game::new(2);
        g.init_vertex(0, 0, 1);
        g.init_vertex(1, 0, 0);
        g.add_edge(0, 0);
        g.add_edge(0, 1);
        g.add_edge(1, 1);
        let mut d = Driver::new(g, DriverOptions::default());
        d.solve_selfloops().unwrap();
        // vertex 1 had a winning self-loop, and flush then attracts vertex 0
        assert!(!d.game().successors(0).contains(&0));
        assert!(d.game().is_solved(0));
        assert_eq!(d.game().winner(0), 0);
        assert_eq!(d.game().strategy(0), 1);
    }

    #[test]
    fn test_trivial_cycle_three_ring() {
        // all owned by player 0, even priorities, one directed triangle
        let mut g = Game::new(3);
        g.init_vertex(0, 0, 4);
        g.init_vertex(1, 0, 2);
        g.init_vertex(2, 0, 0);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(2, 0);
        let mut d = Driver::new(g, DriverOptions::default());
        assert_eq!(d.solve_trivial_cycles().unwrap(), 1);
        assert!(d.game().game_solved());
        for v in 0..3 {
            assert_eq!(d.game().winner(v), 0);
        }
        assert_eq!(d.game().strategy(0), 1);
        assert_eq!(d.game().strategy(1), 2);
        assert_eq!(d.game().strategy(2), 0);
    }

    #[test]
    fn test_cycle_with_opponent_priority_not_solved() {
        // player-0 controlled ring, but the top priority is odd
        let mut g = Game::new(2);
        g.init_vertex(0, 0, 3);
        g.init_vertex(1, 0, 2);
        g.add_edge(0, 1);
        g.add_edge(1, 0);
        let mut d = Driver::new(g, DriverOptions::default());
        assert_eq!(d.solve_trivial_cycles().unwrap(), 0);
        assert!(!d.game().is_solved(0));
        assert!(!d.game().is_solved(1));
    }

    #[test]
    fn test_single_parity_shortcut() {
        let mut g = Game::new(2);
        g.init_vertex(0, 0, 2);
        g.init_vertex(1, 1, 4);
        g.add_edge(0, 1);
        g.add_edge(1, 0);
        let mut d = Driver::new(g, DriverOptions::default());
        assert!(d.solve_single_parity().unwrap());
        assert!(d.game().game_solved());
        assert_eq!(d.game().winner(0), 0);
        assert_eq!(d.game().winner(1), 0);
        assert_eq!(d.game().strategy(0), 1);
        assert_eq!(d.game().strategy(1), STRAT_NONE);
    }

    #[test]
    fn test_mixed_parity_not_shortcut() {
        let mut g = Game::new(2);
        g.init_vertex(0, 0, 1);
        g.init_vertex(1, 1, 2);
        g.add_edge(0, 1);
        g.add_edge(1, 0);
        let mut d = Driver::new(g, DriverOptions::default());
        assert!(!d.solve_single_parity().unwrap());
        assert!(!d.game().is_solved(0));
    }
}
