//! A small charset-labelled automaton toolkit.
//!
//! Used by one fix rule: a single character sandwiched between two
//! single-character quantifiers is resolved exactly by building the NFA of
//! the three-part concatenation, determinizing over the atomic decomposition
//! of the involved sets, minimizing, and printing the minimal DFA back as a
//! regex fragment via state elimination. All orderings are deterministic so
//! the printed fragment is stable.

use std::collections::BTreeMap;

use crate::ast::Flags;
use crate::chars::{self, CharSet};
use crate::fix::quant_to_string;

/// One part of the concatenation model.
pub(crate) enum Part {
    /// `set{min,}`
    Repeat { set: CharSet, min: u32 },
    /// A single mandatory character.
    Single { set: CharSet },
}

/// Unrolling guard: repeat minimums above this decline the rewrite instead
/// of building a huge automaton.
const MAX_REPEAT_MIN: u32 = 50;

/// Builds the minimal regex fragment equivalent to the concatenation of the
/// given parts. Returns `None` when a part is degenerate or too large.
pub(crate) fn three_part_to_regex(parts: &[Part], flags: &Flags) -> Option<String> {
    for part in parts {
        let (set, min) = match part {
            Part::Repeat { set, min } => (set, *min),
            Part::Single { set } => (set, 0),
        };
        if set.is_empty() || min > MAX_REPEAT_MIN {
            return None;
        }
    }

    let nfa = build_nfa(parts);
    let dfa = determinize(&nfa, flags);
    let dfa = dfa.trim()?;
    let dfa = dfa.minimize();
    let re = dfa.to_regex();
    let source = print_regex(&re, flags);
    if matches!(re, Re::Alt(_)) {
        Some(format!("(?:{source})"))
    } else {
        Some(source)
    }
}

struct Nfa {
    /// Per state: `(set index, target)` edges.
    edges: Vec<Vec<(usize, usize)>>,
    sets: Vec<CharSet>,
    accepting: Vec<usize>,
}

fn build_nfa(parts: &[Part]) -> Nfa {
    let mut nfa = Nfa {
        edges: vec![Vec::new()],
        sets: Vec::new(),
        accepting: Vec::new(),
    };
    let mut frontier: Vec<usize> = vec![0];

    let mut intern = |sets: &mut Vec<CharSet>, set: &CharSet| -> usize {
        match sets.iter().position(|s| s == set) {
            Some(index) => index,
            None => {
                sets.push(set.clone());
                sets.len() - 1
            }
        }
    };

    for part in parts {
        match part {
            Part::Single { set } => {
                let set = intern(&mut nfa.sets, set);
                let target = nfa.edges.len();
                nfa.edges.push(Vec::new());
                for &from in &frontier {
                    nfa.edges[from].push((set, target));
                }
                frontier = vec![target];
            }
            Part::Repeat { set, min } => {
                let set = intern(&mut nfa.sets, set);
                if *min == 0 {
                    let target = nfa.edges.len();
                    nfa.edges.push(Vec::new());
                    for &from in &frontier {
                        nfa.edges[from].push((set, target));
                    }
                    nfa.edges[target].push((set, target));
                    frontier.push(target);
                } else {
                    for _ in 0..*min {
                        let target = nfa.edges.len();
                        nfa.edges.push(Vec::new());
                        for &from in &frontier {
                            nfa.edges[from].push((set, target));
                        }
                        frontier = vec![target];
                    }
                    let last = frontier[0];
                    nfa.edges[last].push((set, last));
                }
            }
        }
    }

    nfa.accepting = frontier;
    nfa
}

struct Dfa {
    /// `trans[state][atom]`
    trans: Vec<Vec<Option<usize>>>,
    accepting: Vec<bool>,
    atoms: Vec<CharSet>,
    start: usize,
}

/// Splits the alphabet into atoms: non-empty sets on which every NFA edge
/// set is either fully present or fully absent.
fn atomize(sets: &[CharSet], flags: &Flags) -> Vec<CharSet> {
    let mut atoms = vec![chars::all(flags)];
    for set in sets {
        let mut next = Vec::with_capacity(atoms.len() * 2);
        for atom in atoms {
            let inside = atom.intersect(set);
            let outside = atom.without(set);
            if !inside.is_empty() {
                next.push(inside);
            }
            if !outside.is_empty() {
                next.push(outside);
            }
        }
        atoms = next;
    }
    atoms
}

fn determinize(nfa: &Nfa, flags: &Flags) -> Dfa {
    let atoms = atomize(&nfa.sets, flags);
    // atom -> set indices containing it
    let membership: Vec<Vec<bool>> = atoms
        .iter()
        .map(|atom| nfa.sets.iter().map(|s| atom.is_subset_of(s)).collect())
        .collect();

    let mut ids: BTreeMap<Vec<usize>, usize> = BTreeMap::new();
    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut trans: Vec<Vec<Option<usize>>> = Vec::new();

    let start_key = vec![0usize];
    ids.insert(start_key.clone(), 0);
    order.push(start_key);
    let mut next = 0;
    while next < order.len() {
        let states = order[next].clone();
        let mut row = Vec::with_capacity(atoms.len());
        for contains in &membership {
            let mut targets: Vec<usize> = Vec::new();
            for &s in &states {
                for &(set, to) in &nfa.edges[s] {
                    if contains[set] && !targets.contains(&to) {
                        targets.push(to);
                    }
                }
            }
            if targets.is_empty() {
                row.push(None);
                continue;
            }
            targets.sort_unstable();
            let id = *ids.entry(targets.clone()).or_insert_with(|| {
                order.push(targets.clone());
                order.len() - 1
            });
            row.push(Some(id));
        }
        trans.push(row);
        next += 1;
    }

    let accepting = order
        .iter()
        .map(|states| states.iter().any(|s| nfa.accepting.contains(s)))
        .collect();
    Dfa {
        trans,
        accepting,
        atoms,
        start: 0,
    }
}

impl Dfa {
    /// Removes states that cannot reach an accepting state. Returns `None`
    /// when the language is empty.
    fn trim(self) -> Option<Dfa> {
        let n = self.trans.len();
        let mut productive = self.accepting.clone();
        loop {
            let mut changed = false;
            for s in 0..n {
                if productive[s] {
                    continue;
                }
                if self.trans[s]
                    .iter()
                    .flatten()
                    .any(|&t| productive[t])
                {
                    productive[s] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        if !productive[self.start] {
            return None;
        }

        let mut remap = vec![None; n];
        let mut kept = 0;
        for s in 0..n {
            if productive[s] {
                remap[s] = Some(kept);
                kept += 1;
            }
        }
        let trans = (0..n)
            .filter(|&s| productive[s])
            .map(|s| {
                self.trans[s]
                    .iter()
                    .map(|t| t.and_then(|t| remap[t]))
                    .collect()
            })
            .collect();
        let accepting = (0..n).filter(|&s| productive[s]).map(|s| self.accepting[s]).collect();
        let start = remap[self.start].unwrap_or_else(|| unreachable!("start is productive"));
        Some(Dfa {
            trans,
            accepting,
            atoms: self.atoms,
            start,
        })
    }

    /// Moore partition refinement.
    fn minimize(self) -> Dfa {
        let n = self.trans.len();
        let mut class: Vec<usize> = self.accepting.iter().map(|&a| usize::from(a)).collect();
        loop {
            let mut signatures: BTreeMap<(usize, Vec<Option<usize>>), usize> = BTreeMap::new();
            let mut next_class = vec![0; n];
            for s in 0..n {
                let signature = (
                    class[s],
                    self.trans[s].iter().map(|t| t.map(|t| class[t])).collect(),
                );
                let id = signatures.len();
                let id = *signatures.entry(signature).or_insert(id);
                next_class[s] = id;
            }
            let stable = {
                let count = signatures.len();
                let previous = class.iter().copied().collect::<std::collections::BTreeSet<_>>();
                count == previous.len()
            };
            class = next_class;
            if stable {
                break;
            }
        }

        let count = class.iter().copied().max().map_or(0, |m| m + 1);
        let mut trans = vec![vec![None; self.atoms.len()]; count];
        let mut accepting = vec![false; count];
        for s in 0..n {
            accepting[class[s]] = accepting[class[s]] || self.accepting[s];
            for (atom, target) in self.trans[s].iter().enumerate() {
                trans[class[s]][atom] = target.map(|t| class[t]);
            }
        }
        Dfa {
            trans,
            accepting,
            atoms: self.atoms,
            start: class[self.start],
        }
    }

    /// State elimination into a regex tree.
    fn to_regex(&self) -> Re {
        let n = self.trans.len();
        let start = n;
        let accept = n + 1;
        let mut edges: BTreeMap<(usize, usize), Re> = BTreeMap::new();

        for s in 0..n {
            // Merge atoms per target into one character set edge.
            let mut by_target: BTreeMap<usize, CharSet> = BTreeMap::new();
            for (atom, target) in self.trans[s].iter().enumerate() {
                if let Some(target) = target {
                    by_target
                        .entry(*target)
                        .and_modify(|set| *set = set.union(&self.atoms[atom]))
                        .or_insert_with(|| self.atoms[atom].clone());
                }
            }
            for (target, set) in by_target {
                merge_edge(&mut edges, (s, target), Re::Chars(set));
            }
        }
        merge_edge(&mut edges, (start, self.start), Re::Empty);
        for (s, &accepting) in self.accepting.iter().enumerate() {
            if accepting {
                merge_edge(&mut edges, (s, accept), Re::Empty);
            }
        }

        for q in 0..n {
            let self_loop = edges.remove(&(q, q)).map(Re::star).unwrap_or(Re::Empty);
            let ins: Vec<((usize, usize), Re)> = edges
                .iter()
                .filter(|((_, to), _)| *to == q)
                .map(|(&k, v)| (k, v.clone()))
                .collect();
            let outs: Vec<((usize, usize), Re)> = edges
                .iter()
                .filter(|((from, _), _)| *from == q)
                .map(|(&k, v)| (k, v.clone()))
                .collect();
            for ((from, _), _) in &ins {
                edges.remove(&(*from, q));
            }
            for ((_, to), _) in &outs {
                edges.remove(&(q, *to));
            }
            for ((from, _), in_label) in &ins {
                for ((_, to), out_label) in &outs {
                    let label = Re::concat(vec![
                        in_label.clone(),
                        self_loop.clone(),
                        out_label.clone(),
                    ]);
                    merge_edge(&mut edges, (*from, *to), label);
                }
            }
        }

        edges.remove(&(start, accept)).unwrap_or(Re::Never)
    }
}

fn merge_edge(edges: &mut BTreeMap<(usize, usize), Re>, key: (usize, usize), label: Re) {
    match edges.remove(&key) {
        Some(existing) => {
            edges.insert(key, Re::alt(existing, label));
        }
        None => {
            edges.insert(key, label);
        }
    }
}

/// A regex fragment tree with normalizing constructors.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Re {
    Never,
    Empty,
    Chars(CharSet),
    Concat(Vec<Re>),
    Alt(Vec<Re>),
    Repeat {
        inner: Box<Re>,
        min: u32,
        max: Option<u32>,
    },
}

impl Re {
    fn concat(items: Vec<Re>) -> Re {
        let mut out = Vec::new();
        for item in items {
            match item {
                Re::Never => return Re::Never,
                Re::Empty => {}
                Re::Concat(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Re::Empty,
            1 => out.pop().unwrap_or(Re::Empty),
            _ => Re::Concat(out),
        }
    }

    fn alt(a: Re, b: Re) -> Re {
        let mut members = Vec::new();
        let mut optional = false;
        let mut chars: Option<CharSet> = None;
        for item in [a, b] {
            let parts = match item {
                Re::Alt(parts) => parts,
                other => vec![other],
            };
            for part in parts {
                match part {
                    Re::Never => {}
                    Re::Empty => optional = true,
                    Re::Chars(set) => {
                        chars = Some(match chars {
                            Some(existing) => existing.union(&set),
                            None => set,
                        });
                    }
                    Re::Repeat {
                        inner,
                        min: 0,
                        max,
                    } => {
                        // (x{0,n}|..) keeps the empty branch implicit.
                        optional = true;
                        members.push(Re::Repeat {
                            inner,
                            min: 1,
                            max,
                        });
                    }
                    other => {
                        if !members.contains(&other) {
                            members.push(other);
                        }
                    }
                }
            }
        }
        if let Some(set) = chars {
            members.insert(0, Re::Chars(set));
        }
        let base = match members.len() {
            0 => return if optional { Re::Empty } else { Re::Never },
            1 => members.pop().unwrap_or(Re::Never),
            _ => Re::Alt(members),
        };
        if optional {
            Re::Repeat {
                inner: Box::new(base),
                min: 0,
                max: Some(1),
            }
        } else {
            base
        }
    }

    fn star(self) -> Re {
        match self {
            Re::Never | Re::Empty => Re::Empty,
            Re::Repeat {
                inner,
                min: 0 | 1,
                max: None,
            }
            | Re::Repeat {
                inner,
                min: 0,
                max: Some(1),
            } => Re::Repeat {
                inner,
                min: 0,
                max: None,
            },
            other => Re::Repeat {
                inner: Box::new(other),
                min: 0,
                max: None,
            },
        }
    }
}

fn print_regex(re: &Re, flags: &Flags) -> String {
    match re {
        Re::Never => "[]".to_string(),
        Re::Empty => String::new(),
        Re::Chars(set) => chars::char_set_source(set, flags),
        Re::Concat(items) => {
            let mut out = String::new();
            for item in items {
                let printed = print_regex(item, flags);
                if matches!(item, Re::Alt(_)) {
                    out.push_str(&format!("(?:{printed})"));
                } else {
                    out.push_str(&printed);
                }
            }
            out
        }
        Re::Alt(items) => items
            .iter()
            .map(|item| print_regex(item, flags))
            .collect::<Vec<_>>()
            .join("|"),
        Re::Repeat { inner, min, max } => {
            let printed = print_regex(inner, flags);
            let atom = if matches!(**inner, Re::Chars(_)) {
                printed
            } else {
                format!("(?:{printed})")
            };
            format!(
                "{atom}{}",
                quant_to_string(u64::from(*min), max.map(u64::from), true)
            )
        }
    }
}
