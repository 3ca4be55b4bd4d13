//! Basic-block graph over a lowered body.

use std::{
    collections::HashMap,
    io::{self, Write},
};

use crate::{
    bound::{BoundExpr, BoundStmt, Label},
    util::fmt::bound::{print_expr_string, print_stmts_string},
    value::Value,
};

pub type BlockId = usize;

const START: BlockId = 0;
const END: BlockId = 1;

#[derive(Debug)]
pub struct BasicBlock {
    pub statements: Vec<BoundStmt>,
}

/// A transition between blocks, taken when `condition` (if any) holds.
#[derive(Debug)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    pub condition: Option<Condition>,
}

#[derive(Debug)]
pub struct Condition {
    pub expr: BoundExpr,
    pub when: bool,
}

/// The control flow graph of one lowered body. Blocks 0 and 1 are the
/// empty start and end blocks. Blocks unreachable from the start are
/// removed.
#[derive(Debug)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    pub edges: Vec<Edge>,
}

impl ControlFlowGraph {
    pub fn create(body: &[BoundStmt]) -> ControlFlowGraph {
        let mut blocks = vec![
            BasicBlock {
                statements: Vec::new(),
            },
            BasicBlock {
                statements: Vec::new(),
            },
        ];
        blocks.extend(split_blocks(body));

        let labels: HashMap<&Label, BlockId> = blocks
            .iter()
            .enumerate()
            .filter_map(|(id, block)| match block.statements.first() {
                Some(BoundStmt::Label(label)) => Some((label, id)),
                _ => None,
            })
            .collect();
        let target = |label: &Label| -> BlockId {
            *labels
                .get(label)
                .unwrap_or_else(|| unreachable!("label {label} is not declared"))
        };

        let mut edges = Vec::new();
        let first = if blocks.len() > 2 { 2 } else { END };
        edges.push(Edge {
            from: START,
            to: first,
            condition: None,
        });

        for id in 2..blocks.len() {
            let next = if id + 1 < blocks.len() { id + 1 } else { END };
            let edge = |to, condition| Edge {
                from: id,
                to,
                condition,
            };
            match blocks[id].statements.last() {
                Some(BoundStmt::Goto(label)) => edges.push(edge(target(label), None)),
                Some(BoundStmt::ConditionalGoto {
                    label,
                    condition,
                    jump_if_true,
                }) => match condition {
                    BoundExpr::Literal(Value::Bool(value)) => {
                        let to = if value == jump_if_true {
                            target(label)
                        } else {
                            next
                        };
                        edges.push(edge(to, None));
                    }
                    _ => {
                        edges.push(edge(
                            target(label),
                            Some(Condition {
                                expr: condition.clone(),
                                when: *jump_if_true,
                            }),
                        ));
                        edges.push(edge(
                            next,
                            Some(Condition {
                                expr: condition.clone(),
                                when: !jump_if_true,
                            }),
                        ));
                    }
                },
                Some(BoundStmt::Return(_)) => edges.push(edge(END, None)),
                _ => edges.push(edge(next, None)),
            }
        }

        let mut graph = ControlFlowGraph { blocks, edges };
        graph.remove_unreachable();
        graph
    }

    /// Whether every path through `body` ends in a return statement.
    /// Bodies that never reach their end (infinite loops) count as
    /// returning.
    pub fn all_paths_return(body: &[BoundStmt]) -> bool {
        let graph = ControlFlowGraph::create(body);
        let all_return = graph.incoming(END).all(|edge| {
            matches!(
                graph.blocks[edge.from].statements.last(),
                Some(BoundStmt::Return(_))
            )
        });
        all_return
    }

    pub fn incoming(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    pub fn outgoing(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.from == id)
    }

    fn remove_unreachable(&mut self) {
        let mut reachable = vec![false; self.blocks.len()];
        reachable[START] = true;
        reachable[END] = true;
        let mut work = vec![START];
        while let Some(id) = work.pop() {
            for edge in self.edges.iter().filter(|e| e.from == id) {
                if !reachable[edge.to] {
                    reachable[edge.to] = true;
                    work.push(edge.to);
                }
            }
        }

        let mut remap = Vec::with_capacity(self.blocks.len());
        let mut next = 0;
        for &is_reachable in &reachable {
            remap.push(next);
            if is_reachable {
                next += 1;
            }
        }

        let removed = reachable.iter().filter(|r| !**r).count();
        if removed > 0 {
            tracing::trace!(removed, "removed unreachable blocks");
        }

        self.edges.retain(|e| reachable[e.from]);
        for edge in &mut self.edges {
            edge.from = remap[edge.from];
            edge.to = remap[edge.to];
        }
        let mut keep = reachable.into_iter();
        self.blocks.retain(|_| keep.next().unwrap_or(false));
    }

    /// Writes the graph in Graphviz dot format.
    pub fn write_dot(&self, w: &mut impl Write) -> io::Result<()> {
        writeln!(w, "digraph G {{")?;
        for (id, block) in self.blocks.iter().enumerate() {
            let label = match id {
                START => "<Start>".to_owned(),
                END => "<End>".to_owned(),
                _ => print_stmts_string(&block.statements),
            };
            let label = escape(label.trim_end()).replace('\n', "\\l");
            writeln!(w, "    N{id} [label = \"{label}\", shape = box]")?;
        }
        for edge in &self.edges {
            let label = edge.condition.as_ref().map_or(String::new(), |c| {
                let expr = print_expr_string(&c.expr);
                if c.when { expr } else { format!("!({expr})") }
            });
            writeln!(
                w,
                "    N{} -> N{} [label = \"{}\"]",
                edge.from,
                edge.to,
                escape(&label)
            )?;
        }
        writeln!(w, "}}")
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Cuts the body before every label and after every jump or return.
fn split_blocks(body: &[BoundStmt]) -> Vec<BasicBlock> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    let mut end_block = |current: &mut Vec<BoundStmt>| {
        if !current.is_empty() {
            blocks.push(BasicBlock {
                statements: std::mem::take(current),
            });
        }
    };

    for stmt in body {
        match stmt {
            BoundStmt::Label(_) => {
                end_block(&mut current);
                current.push(stmt.clone());
            }
            BoundStmt::Goto(_) | BoundStmt::ConditionalGoto { .. } | BoundStmt::Return(_) => {
                current.push(stmt.clone());
                end_block(&mut current);
            }
            _ => current.push(stmt.clone()),
        }
    }
    end_block(&mut current);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Type, Variable, VariableKind};

    fn label(name: &str) -> Label {
        Label::new(name)
    }

    fn int(i: i64) -> BoundExpr {
        BoundExpr::Literal(Value::Int(i))
    }

    fn flag() -> BoundExpr {
        BoundExpr::Variable(Variable::new("flag", false, Type::Bool, VariableKind::Local))
    }

    #[test]
    fn test_straight_line_return() {
        let body = [BoundStmt::Return(Some(int(1)))];
        assert!(ControlFlowGraph::all_paths_return(&body));
        assert!(!ControlFlowGraph::all_paths_return(&[]));
    }

    #[test]
    fn test_one_branch_missing_return() {
        // goto else unless flag; return 1; else:
        let body = [
            BoundStmt::ConditionalGoto {
                label: label("else"),
                condition: flag(),
                jump_if_true: false,
            },
            BoundStmt::Return(Some(int(1))),
            BoundStmt::Label(label("else")),
        ];
        assert!(!ControlFlowGraph::all_paths_return(&body));
    }

    #[test]
    fn test_both_branches_return() {
        let body = [
            BoundStmt::ConditionalGoto {
                label: label("else"),
                condition: flag(),
                jump_if_true: false,
            },
            BoundStmt::Return(Some(int(1))),
            BoundStmt::Label(label("else")),
            BoundStmt::Return(Some(int(2))),
        ];
        assert!(ControlFlowGraph::all_paths_return(&body));
    }

    #[test]
    fn test_infinite_loop_counts_as_returning() {
        // goto continue; body: continue: goto body if true; break:
        let body = [
            BoundStmt::Goto(label("continue")),
            BoundStmt::Label(label("body")),
            BoundStmt::Label(label("continue")),
            BoundStmt::ConditionalGoto {
                label: label("body"),
                condition: BoundExpr::Literal(Value::Bool(true)),
                jump_if_true: true,
            },
            BoundStmt::Label(label("break")),
        ];
        assert!(ControlFlowGraph::all_paths_return(&body));
        let graph = ControlFlowGraph::create(&body);
        assert_eq!(graph.incoming(END).count(), 0);
    }

    #[test]
    fn test_unreachable_blocks_are_removed() {
        let body = [
            BoundStmt::Return(None),
            BoundStmt::Expression(int(1)),
            BoundStmt::Return(None),
        ];
        let graph = ControlFlowGraph::create(&body);
        assert_eq!(graph.blocks.len(), 3);
        assert_eq!(graph.outgoing(START).count(), 1);
        assert_eq!(graph.incoming(END).count(), 1);
    }

    #[test]
    fn test_dot_output() {
        let body = [
            BoundStmt::ConditionalGoto {
                label: label("end"),
                condition: flag(),
                jump_if_true: true,
            },
            BoundStmt::Expression(int(1)),
            BoundStmt::Label(label("end")),
        ];
        let mut out = Vec::new();
        ControlFlowGraph::create(&body).write_dot(&mut out).unwrap();
        let dot = String::from_utf8(out).unwrap();
        assert!(dot.starts_with("digraph G {\n"));
        assert!(dot.contains("N0 [label = \"<Start>\", shape = box]"));
        assert!(dot.contains("N2 -> N4 [label = \"flag\"]"));
        assert!(dot.contains("N2 -> N3 [label = \"!(flag)\"]"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
