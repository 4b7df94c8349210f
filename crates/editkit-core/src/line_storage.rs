//! Line storage: an order-statistics red-black tree over document lines.
//!
//! # Overview
//!
//! Lines are kept in document order. Each node stores its own length (UTF-16 units, terminator
//! included) and height, plus the totals of its **left subtree** (length, height, line count).
//! With those sums a single root-to-leaf descent resolves:
//!
//! - the line containing a character offset ([`LineStorage::get_line`]),
//! - the line at a vertical position ([`LineStorage::get_line_at_y`]),
//! - the line at an index ([`LineStorage::get_line_at_index`]),
//!
//! all in O(log n). Insertion, deletion and in-place updates keep the sums current by
//! propagating deltas along the parent path, and rotations adjust the sums of the two rotated
//! nodes only.
//!
//! Nodes live in an arena (`Vec`) and link to each other by index. Deleting a node moves the last
//! arena slot into the freed one, so the arena stays dense.
//!
//! # Invariants
//!
//! - The in-order traversal is document order; each line starts where the previous one ends.
//! - A line includes its terminator. Only the last line may have zero length.
//! - Standard red-black balance: the root is black, no red node has a red child, every path from
//!   a node to a leaf crosses the same number of black nodes.
//!
//! [`LineStorage::validate`] recomputes everything from scratch and is used by the tests.

use std::ops::Range;

type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Node<T> {
    data: T,
    length: usize,
    height: f64,
    left_length: usize,
    left_height: f64,
    left_count: usize,
    color: Color,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl<T> Node<T> {
    fn new(data: T, length: usize, height: f64) -> Self {
        Self {
            data,
            length,
            height,
            left_length: 0,
            left_height: 0.0,
            left_count: 0,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
        }
    }
}

/// A resolved line: its payload plus where it sits in the document.
#[derive(Debug)]
pub struct LinePosition<'a, T> {
    /// The line's payload.
    pub data: &'a T,
    /// Character range of the line, terminator included.
    pub range: Range<usize>,
    /// Top edge of the line.
    pub y_pos: f64,
    /// Height of the line.
    pub height: f64,
    /// Zero-based line index.
    pub index: usize,
}

impl<T> Clone for LinePosition<'_, T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            range: self.range.clone(),
            y_pos: self.y_pos,
            height: self.height,
            index: self.index,
        }
    }
}

impl<T> LinePosition<'_, T> {
    /// Length of the line in UTF-16 units.
    pub fn length(&self) -> usize {
        self.range.len()
    }

    /// The position without the payload borrow.
    pub fn bounds(&self) -> LineBounds {
        LineBounds {
            range: self.range.clone(),
            y_pos: self.y_pos,
            height: self.height,
            index: self.index,
        }
    }
}

/// Owned line geometry, detached from the storage borrow.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBounds {
    /// Character range of the line, terminator included.
    pub range: Range<usize>,
    /// Top edge of the line.
    pub y_pos: f64,
    /// Height of the line.
    pub height: f64,
    /// Zero-based line index.
    pub index: usize,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    id: NodeId,
    start: usize,
    y_pos: f64,
    index: usize,
}

/// An order-statistics red-black tree of lines carrying a payload `T`.
#[derive(Debug, Clone)]
pub struct LineStorage<T> {
    nodes: Vec<Node<T>>,
    root: Option<NodeId>,
    length: usize,
    height: f64,
}

impl<T> Default for LineStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LineStorage<T> {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            length: 0,
            height: 0.0,
        }
    }

    /// Build a balanced storage from lines in document order, in O(n).
    ///
    /// Each item is `(payload, length, height)`.
    pub fn build<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (T, usize, f64)>,
    {
        let mut storage = Self::new();
        for (data, length, height) in lines {
            storage.length += length;
            storage.height += height;
            let mut node = Node::new(data, length, height);
            node.color = Color::Black;
            storage.nodes.push(node);
        }

        let count = storage.nodes.len();
        if count > 0 {
            // Levels above `red_depth` are complete; nodes on the partial bottom level are red.
            let red_depth = (usize::BITS - 1 - (count + 1).leading_zeros()) as usize;
            let (root, ..) = storage.link_balanced(0, count, 0, red_depth, None);
            storage.root = root;
        }
        storage
    }

    /// Total length of all lines, in UTF-16 units.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Total height of all lines.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Number of lines.
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the storage holds no lines.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.length = 0;
        self.height = 0.0;
    }

    /// Insert a line so that it starts at `at_offset`.
    ///
    /// The new line is placed after every line that starts before `at_offset`, so
    /// `at_offset` should be a line boundary (or the total length).
    pub fn insert(&mut self, data: T, at_offset: usize, length: usize, height: f64) {
        debug_assert!(
            at_offset <= self.length,
            "insert offset {at_offset} past end {}",
            self.length
        );
        let index = self.count_lines_starting_before(at_offset);
        self.insert_at_index(index, data, length, height);
    }

    /// Insert a line so that it becomes line `index` (clamped to the line count).
    pub fn insert_at_index(&mut self, index: usize, data: T, length: usize, height: f64) {
        debug_assert!(index <= self.count(), "insert index {index} past end");
        let index = index.min(self.count());

        let id = self.nodes.len();
        self.nodes.push(Node::new(data, length, height));
        self.length += length;
        self.height += height;

        let Some(mut cur) = self.root else {
            self.nodes[id].color = Color::Black;
            self.root = Some(id);
            return;
        };

        let mut before = 0;
        loop {
            let node = &self.nodes[cur];
            let cur_index = before + node.left_count;
            if index <= cur_index {
                match node.left {
                    Some(left) => cur = left,
                    None => {
                        self.nodes[cur].left = Some(id);
                        break;
                    }
                }
            } else {
                before = cur_index + 1;
                match node.right {
                    Some(right) => cur = right,
                    None => {
                        self.nodes[cur].right = Some(id);
                        break;
                    }
                }
            }
        }

        self.nodes[id].parent = Some(cur);
        self.propagate(id, length as isize, height, 1);
        self.insert_fixup(id);
    }

    /// Delete the line containing `offset` and return its payload.
    pub fn delete(&mut self, offset: usize) -> Option<T> {
        let cursor = self.find_by_offset(offset)?;
        Some(self.remove_node(cursor.id))
    }

    /// Delete line `index` and return its payload.
    pub fn delete_at_index(&mut self, index: usize) -> Option<T> {
        let cursor = self.find_by_index(index)?;
        Some(self.remove_node(cursor.id))
    }

    /// Adjust the length and height of the line containing `offset`.
    ///
    /// Returns `false` if no line contains `offset`.
    pub fn update(&mut self, offset: usize, length_delta: isize, height_delta: f64) -> bool {
        match self.find_by_offset(offset) {
            Some(cursor) => {
                self.apply_delta(cursor.id, length_delta, height_delta);
                true
            }
            None => false,
        }
    }

    /// Adjust the length and height of line `index`.
    pub fn update_at_index(&mut self, index: usize, length_delta: isize, height_delta: f64) -> bool {
        match self.find_by_index(index) {
            Some(cursor) => {
                self.apply_delta(cursor.id, length_delta, height_delta);
                true
            }
            None => false,
        }
    }

    /// Set the height of line `index`.
    pub fn set_height_at_index(&mut self, index: usize, height: f64) -> bool {
        match self.find_by_index(index) {
            Some(cursor) => {
                let delta = height - self.nodes[cursor.id].height;
                self.apply_delta(cursor.id, 0, delta);
                true
            }
            None => false,
        }
    }

    /// Set the height of the line containing `offset`.
    pub fn set_height(&mut self, offset: usize, height: f64) -> bool {
        match self.find_by_offset(offset) {
            Some(cursor) => {
                let delta = height - self.nodes[cursor.id].height;
                self.apply_delta(cursor.id, 0, delta);
                true
            }
            None => false,
        }
    }

    /// The line containing `offset`: the last line whose start is `<= offset`.
    ///
    /// `offset == length()` resolves to the last line. Offsets past the end return `None`.
    pub fn get_line(&self, offset: usize) -> Option<LinePosition<'_, T>> {
        self.find_by_offset(offset).map(|c| self.position(c))
    }

    /// The line covering vertical position `y`.
    pub fn get_line_at_y(&self, y: f64) -> Option<LinePosition<'_, T>> {
        self.find_by_y(y).map(|c| self.position(c))
    }

    /// Line `index`.
    pub fn get_line_at_index(&self, index: usize) -> Option<LinePosition<'_, T>> {
        self.find_by_index(index).map(|c| self.position(c))
    }

    /// The first line.
    pub fn first(&self) -> Option<LinePosition<'_, T>> {
        self.get_line_at_index(0)
    }

    /// The last line.
    pub fn last(&self) -> Option<LinePosition<'_, T>> {
        self.count()
            .checked_sub(1)
            .and_then(|index| self.get_line_at_index(index))
    }

    /// Mutable payload of the line containing `offset`.
    pub fn data_mut(&mut self, offset: usize) -> Option<&mut T> {
        let cursor = self.find_by_offset(offset)?;
        Some(&mut self.nodes[cursor.id].data)
    }

    /// Mutable payload of line `index`.
    pub fn data_mut_at_index(&mut self, index: usize) -> Option<&mut T> {
        let cursor = self.find_by_index(index)?;
        Some(&mut self.nodes[cursor.id].data)
    }

    /// All lines in document order.
    pub fn iter(&self) -> LineIter<'_, T> {
        LineIter {
            storage: self,
            next: self.find_by_index(0),
            bound: IterBound::Unbounded,
        }
    }

    /// Lines from `index` to the end.
    pub fn iter_from_index(&self, index: usize) -> LineIter<'_, T> {
        LineIter {
            storage: self,
            next: self.find_by_index(index),
            bound: IterBound::Unbounded,
        }
    }

    /// Lines overlapping the character range `range`.
    ///
    /// An empty range yields the single line containing `range.start`.
    pub fn lines_in_range(&self, range: Range<usize>) -> LineIter<'_, T> {
        LineIter {
            storage: self,
            next: self.find_by_offset(range.start),
            bound: IterBound::Offset(range.end),
        }
    }

    /// Lines from the one covering `y` until the first line that reaches `until_y`.
    pub fn lines_starting_at(&self, y: f64, until_y: f64) -> LineIter<'_, T> {
        LineIter {
            storage: self,
            next: self.find_by_y(y.max(0.0)),
            bound: IterBound::Y(until_y),
        }
    }

    /// Recompute every cached sum and check the red-black invariants.
    pub fn validate(&self) -> Result<(), String> {
        let Some(root) = self.root else {
            return if self.nodes.is_empty() && self.length == 0 {
                Ok(())
            } else {
                Err("empty tree with non-empty arena or totals".to_string())
            };
        };

        if self.nodes[root].parent.is_some() {
            return Err("root has a parent".to_string());
        }
        if self.nodes[root].color != Color::Black {
            return Err("root is red".to_string());
        }

        let totals = self.validate_subtree(root)?;
        if totals.count != self.nodes.len() {
            return Err(format!(
                "tree reaches {} nodes but the arena holds {}",
                totals.count,
                self.nodes.len()
            ));
        }
        if totals.length != self.length {
            return Err(format!(
                "cached length {} but lines sum to {}",
                self.length, totals.length
            ));
        }
        if !approx_eq(totals.height, self.height) {
            return Err(format!(
                "cached height {} but lines sum to {}",
                self.height, totals.height
            ));
        }

        for (index, line) in self.iter().enumerate() {
            if index + 1 < self.count() && line.length() == 0 {
                return Err(format!("line {index} is empty but is not the last line"));
            }
        }
        Ok(())
    }

    fn position(&self, cursor: Cursor) -> LinePosition<'_, T> {
        let node = &self.nodes[cursor.id];
        LinePosition {
            data: &node.data,
            range: cursor.start..cursor.start + node.length,
            y_pos: cursor.y_pos,
            height: node.height,
            index: cursor.index,
        }
    }

    fn count_lines_starting_before(&self, offset: usize) -> usize {
        let mut count = 0;
        let mut before = 0;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            let start = before + node.left_length;
            if start < offset {
                count += node.left_count + 1;
                before = start + node.length;
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        count
    }

    fn find_by_offset(&self, offset: usize) -> Option<Cursor> {
        if offset > self.length {
            return None;
        }

        let mut best = None;
        let (mut before_len, mut before_y, mut before_count) = (0, 0.0, 0);
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            let start = before_len + node.left_length;
            if offset < start {
                cur = node.left;
                continue;
            }

            let cursor = Cursor {
                id,
                start,
                y_pos: before_y + node.left_height,
                index: before_count + node.left_count,
            };
            best = Some(cursor);
            if offset < start + node.length {
                break;
            }
            before_len = start + node.length;
            before_y = cursor.y_pos + node.height;
            before_count = cursor.index + 1;
            cur = node.right;
        }
        best
    }

    fn find_by_y(&self, y: f64) -> Option<Cursor> {
        if !(0.0..self.height).contains(&y) {
            return None;
        }

        let mut best = None;
        let (mut before_len, mut before_y, mut before_count) = (0, 0.0, 0);
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            let top = before_y + node.left_height;
            if y < top {
                cur = node.left;
                continue;
            }

            let cursor = Cursor {
                id,
                start: before_len + node.left_length,
                y_pos: top,
                index: before_count + node.left_count,
            };
            best = Some(cursor);
            if y < top + node.height {
                break;
            }
            before_len = cursor.start + node.length;
            before_y = top + node.height;
            before_count = cursor.index + 1;
            cur = node.right;
        }
        best
    }

    fn find_by_index(&self, index: usize) -> Option<Cursor> {
        if index >= self.count() {
            return None;
        }

        let (mut before_len, mut before_y, mut before_count) = (0, 0.0, 0);
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            let node_index = before_count + node.left_count;
            if index < node_index {
                cur = node.left;
            } else if index == node_index {
                return Some(Cursor {
                    id,
                    start: before_len + node.left_length,
                    y_pos: before_y + node.left_height,
                    index: node_index,
                });
            } else {
                before_len += node.left_length + node.length;
                before_y += node.left_height + node.height;
                before_count = node_index + 1;
                cur = node.right;
            }
        }
        None
    }

    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.nodes[id].right {
            return Some(self.minimum(right));
        }
        let mut child = id;
        let mut parent = self.nodes[id].parent;
        while let Some(p) = parent {
            if self.nodes[p].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    fn minimum(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        id
    }

    fn apply_delta(&mut self, id: NodeId, length_delta: isize, height_delta: f64) {
        let node = &mut self.nodes[id];
        let new_length = node.length as isize + length_delta;
        debug_assert!(new_length >= 0, "line length would become {new_length}");
        let new_length = new_length.max(0);
        let length_delta = new_length - node.length as isize;
        node.length = new_length as usize;
        node.height += height_delta;

        self.length = (self.length as isize + length_delta) as usize;
        self.height += height_delta;
        self.propagate(id, length_delta, height_delta, 0);
    }

    /// Add deltas to the left-subtree sums of every ancestor that has `id` in its left subtree.
    fn propagate(&mut self, id: NodeId, length_delta: isize, height_delta: f64, count_delta: isize) {
        if length_delta == 0 && height_delta == 0.0 && count_delta == 0 {
            return;
        }
        let mut child = id;
        while let Some(parent) = self.nodes[child].parent {
            let node = &mut self.nodes[parent];
            if node.left == Some(child) {
                node.left_length = (node.left_length as isize + length_delta) as usize;
                node.left_height += height_delta;
                node.left_count = (node.left_count as isize + count_delta) as usize;
            }
            child = parent;
        }
    }

    fn remove_node(&mut self, z: NodeId) -> T {
        let (z_length, z_height) = (self.nodes[z].length, self.nodes[z].height);
        self.length -= z_length;
        self.height -= z_height;
        self.propagate(z, -(z_length as isize), -z_height, 0);
        self.nodes[z].length = 0;
        self.nodes[z].height = 0.0;

        // The node that is physically unlinked has at most one child and no own values.
        let target = match (self.nodes[z].left, self.nodes[z].right) {
            (Some(_), Some(right)) => {
                let y = self.minimum(right);
                let (y_length, y_height) = (self.nodes[y].length, self.nodes[y].height);
                self.propagate(y, -(y_length as isize), -y_height, 0);
                self.nodes[y].length = 0;
                self.nodes[y].height = 0.0;
                self.propagate(z, y_length as isize, y_height, 0);
                self.nodes[z].length = y_length;
                self.nodes[z].height = y_height;
                self.swap_data(z, y);
                y
            }
            _ => z,
        };

        self.propagate(target, 0, 0.0, -1);

        let child = self.nodes[target].left.or(self.nodes[target].right);
        let parent = self.nodes[target].parent;
        self.transplant(target, child);
        if self.nodes[target].color == Color::Black {
            self.delete_fixup(child, parent);
        }

        self.release(target).data
    }

    fn swap_data(&mut self, a: NodeId, b: NodeId) {
        debug_assert_ne!(a, b);
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.nodes.split_at_mut(high);
        std::mem::swap(&mut head[low].data, &mut tail[0].data);
    }

    /// Detach `id` from the arena, moving the last slot into its place.
    fn release(&mut self, id: NodeId) -> Node<T> {
        let last = self.nodes.len() - 1;
        if id != last {
            let (parent, left, right) = {
                let moved = &self.nodes[last];
                (moved.parent, moved.left, moved.right)
            };
            match parent {
                Some(p) => {
                    if self.nodes[p].left == Some(last) {
                        self.nodes[p].left = Some(id);
                    } else {
                        self.nodes[p].right = Some(id);
                    }
                }
                None => self.root = Some(id),
            }
            if let Some(l) = left {
                self.nodes[l].parent = Some(id);
            }
            if let Some(r) = right {
                self.nodes[r].parent = Some(id);
            }
        }
        self.nodes.swap_remove(id)
    }

    fn transplant(&mut self, u: NodeId, v: Option<NodeId>) {
        let parent = self.nodes[u].parent;
        match parent {
            None => self.root = v,
            Some(p) => {
                if self.nodes[p].left == Some(u) {
                    self.nodes[p].left = v;
                } else {
                    self.nodes[p].right = v;
                }
            }
        }
        if let Some(v) = v {
            self.nodes[v].parent = parent;
        }
    }

    fn color_of(&self, id: Option<NodeId>) -> Color {
        id.map_or(Color::Black, |id| self.nodes[id].color)
    }

    fn set_color(&mut self, id: Option<NodeId>, color: Color) {
        if let Some(id) = id {
            self.nodes[id].color = color;
        }
    }

    fn left_rotate(&mut self, x: NodeId) {
        let Some(y) = self.nodes[x].right else {
            return;
        };

        // y's left subtree gains x and x's left subtree.
        let (x_length, x_height, x_count) = {
            let node = &self.nodes[x];
            (
                node.left_length + node.length,
                node.left_height + node.height,
                node.left_count + 1,
            )
        };
        {
            let node = &mut self.nodes[y];
            node.left_length += x_length;
            node.left_height += x_height;
            node.left_count += x_count;
        }

        let y_left = self.nodes[y].left;
        self.nodes[x].right = y_left;
        if let Some(b) = y_left {
            self.nodes[b].parent = Some(x);
        }
        self.replace_child(x, y);
        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);
    }

    fn right_rotate(&mut self, y: NodeId) {
        let Some(x) = self.nodes[y].left else {
            return;
        };

        // y's left subtree loses x and x's left subtree.
        let (x_length, x_height, x_count) = {
            let node = &self.nodes[x];
            (
                node.left_length + node.length,
                node.left_height + node.height,
                node.left_count + 1,
            )
        };
        {
            let node = &mut self.nodes[y];
            node.left_length -= x_length;
            node.left_height -= x_height;
            node.left_count -= x_count;
        }

        let x_right = self.nodes[x].right;
        self.nodes[y].left = x_right;
        if let Some(b) = x_right {
            self.nodes[b].parent = Some(y);
        }
        self.replace_child(y, x);
        self.nodes[x].right = Some(y);
        self.nodes[y].parent = Some(x);
    }

    /// Put `new` where `old` hangs off its parent (or the root).
    fn replace_child(&mut self, old: NodeId, new: NodeId) {
        let parent = self.nodes[old].parent;
        self.nodes[new].parent = parent;
        match parent {
            None => self.root = Some(new),
            Some(p) => {
                if self.nodes[p].left == Some(old) {
                    self.nodes[p].left = Some(new);
                } else {
                    self.nodes[p].right = Some(new);
                }
            }
        }
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        while let Some(parent) = self.nodes[z].parent {
            if self.nodes[parent].color != Color::Red {
                break;
            }
            // A red parent is never the root, so the grandparent exists.
            let Some(grand) = self.nodes[parent].parent else {
                break;
            };

            if self.nodes[grand].left == Some(parent) {
                let uncle = self.nodes[grand].right;
                if self.color_of(uncle) == Color::Red {
                    self.nodes[parent].color = Color::Black;
                    self.set_color(uncle, Color::Black);
                    self.nodes[grand].color = Color::Red;
                    z = grand;
                } else {
                    let mut parent = parent;
                    if self.nodes[parent].right == Some(z) {
                        z = parent;
                        self.left_rotate(z);
                        parent = self.nodes[z].parent.unwrap_or(grand);
                    }
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    self.right_rotate(grand);
                }
            } else {
                let uncle = self.nodes[grand].left;
                if self.color_of(uncle) == Color::Red {
                    self.nodes[parent].color = Color::Black;
                    self.set_color(uncle, Color::Black);
                    self.nodes[grand].color = Color::Red;
                    z = grand;
                } else {
                    let mut parent = parent;
                    if self.nodes[parent].left == Some(z) {
                        z = parent;
                        self.right_rotate(z);
                        parent = self.nodes[z].parent.unwrap_or(grand);
                    }
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    self.left_rotate(grand);
                }
            }
        }

        let root = self.root;
        self.set_color(root, Color::Black);
    }

    /// Restore balance after unlinking a black node. `x` took its place (possibly nil) under
    /// `parent`.
    fn delete_fixup(&mut self, mut x: Option<NodeId>, mut parent: Option<NodeId>) {
        while x != self.root && self.color_of(x) == Color::Black {
            let Some(p) = parent else {
                break;
            };

            if self.nodes[p].left == x {
                let Some(mut w) = self.nodes[p].right else {
                    break;
                };
                if self.nodes[w].color == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[p].color = Color::Red;
                    self.left_rotate(p);
                    match self.nodes[p].right {
                        Some(sibling) => w = sibling,
                        None => break,
                    }
                }
                let (w_left, w_right) = (self.nodes[w].left, self.nodes[w].right);
                if self.color_of(w_left) == Color::Black && self.color_of(w_right) == Color::Black
                {
                    self.nodes[w].color = Color::Red;
                    x = Some(p);
                    parent = self.nodes[p].parent;
                } else {
                    if self.color_of(w_right) == Color::Black {
                        self.set_color(w_left, Color::Black);
                        self.nodes[w].color = Color::Red;
                        self.right_rotate(w);
                        match self.nodes[p].right {
                            Some(sibling) => w = sibling,
                            None => break,
                        }
                    }
                    self.nodes[w].color = self.nodes[p].color;
                    self.nodes[p].color = Color::Black;
                    let w_right = self.nodes[w].right;
                    self.set_color(w_right, Color::Black);
                    self.left_rotate(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let Some(mut w) = self.nodes[p].left else {
                    break;
                };
                if self.nodes[w].color == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[p].color = Color::Red;
                    self.right_rotate(p);
                    match self.nodes[p].left {
                        Some(sibling) => w = sibling,
                        None => break,
                    }
                }
                let (w_left, w_right) = (self.nodes[w].left, self.nodes[w].right);
                if self.color_of(w_left) == Color::Black && self.color_of(w_right) == Color::Black
                {
                    self.nodes[w].color = Color::Red;
                    x = Some(p);
                    parent = self.nodes[p].parent;
                } else {
                    if self.color_of(w_left) == Color::Black {
                        self.set_color(w_right, Color::Black);
                        self.nodes[w].color = Color::Red;
                        self.left_rotate(w);
                        match self.nodes[p].left {
                            Some(sibling) => w = sibling,
                            None => break,
                        }
                    }
                    self.nodes[w].color = self.nodes[p].color;
                    self.nodes[p].color = Color::Black;
                    let w_left = self.nodes[w].left;
                    self.set_color(w_left, Color::Black);
                    self.right_rotate(p);
                    x = self.root;
                    parent = None;
                }
            }
        }
        self.set_color(x, Color::Black);
    }

    /// Link arena slots `lo..hi` (already in document order) into a balanced subtree.
    ///
    /// Returns the subtree root and its totals.
    fn link_balanced(
        &mut self,
        lo: usize,
        hi: usize,
        depth: usize,
        red_depth: usize,
        parent: Option<NodeId>,
    ) -> (Option<NodeId>, usize, f64, usize) {
        if lo >= hi {
            return (None, 0, 0.0, 0);
        }
        let mid = lo + (hi - lo) / 2;
        let (left, left_length, left_height, left_count) =
            self.link_balanced(lo, mid, depth + 1, red_depth, Some(mid));
        let (right, right_length, right_height, right_count) =
            self.link_balanced(mid + 1, hi, depth + 1, red_depth, Some(mid));

        let node = &mut self.nodes[mid];
        node.parent = parent;
        node.left = left;
        node.right = right;
        node.left_length = left_length;
        node.left_height = left_height;
        node.left_count = left_count;
        node.color = if depth == red_depth && depth > 0 {
            Color::Red
        } else {
            Color::Black
        };

        (
            Some(mid),
            left_length + node.length + right_length,
            left_height + node.height + right_height,
            left_count + 1 + right_count,
        )
    }

    fn validate_subtree(&self, id: NodeId) -> Result<SubtreeTotals, String> {
        let node = &self.nodes[id];
        let mut left_totals = SubtreeTotals::empty();
        let mut right_totals = SubtreeTotals::empty();

        if let Some(left) = node.left {
            if self.nodes[left].parent != Some(id) {
                return Err(format!("node {left} has a stale parent link"));
            }
            left_totals = self.validate_subtree(left)?;
        }
        if let Some(right) = node.right {
            if self.nodes[right].parent != Some(id) {
                return Err(format!("node {right} has a stale parent link"));
            }
            right_totals = self.validate_subtree(right)?;
        }

        if node.color == Color::Red
            && (self.color_of(node.left) == Color::Red || self.color_of(node.right) == Color::Red)
        {
            return Err(format!("red node {id} has a red child"));
        }
        if left_totals.black_height != right_totals.black_height {
            return Err(format!(
                "black heights differ under node {id}: {} vs {}",
                left_totals.black_height, right_totals.black_height
            ));
        }
        if node.left_length != left_totals.length
            || node.left_count != left_totals.count
            || !approx_eq(node.left_height, left_totals.height)
        {
            return Err(format!(
                "node {id} caches left sums ({}, {}, {}) but its left subtree has ({}, {}, {})",
                node.left_length,
                node.left_height,
                node.left_count,
                left_totals.length,
                left_totals.height,
                left_totals.count
            ));
        }

        Ok(SubtreeTotals {
            length: left_totals.length + node.length + right_totals.length,
            height: left_totals.height + node.height + right_totals.height,
            count: left_totals.count + 1 + right_totals.count,
            black_height: left_totals.black_height + usize::from(node.color == Color::Black),
        })
    }
}

struct SubtreeTotals {
    length: usize,
    height: f64,
    count: usize,
    black_height: usize,
}

impl SubtreeTotals {
    fn empty() -> Self {
        Self {
            length: 0,
            height: 0.0,
            count: 0,
            black_height: 1,
        }
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}

#[derive(Debug, Clone, Copy)]
enum IterBound {
    Unbounded,
    Offset(usize),
    Y(f64),
}

/// Iterator over consecutive lines. Create a new one to restart.
pub struct LineIter<'a, T> {
    storage: &'a LineStorage<T>,
    next: Option<Cursor>,
    bound: IterBound,
}

impl<T> Clone for LineIter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage,
            next: self.next,
            bound: self.bound,
        }
    }
}

impl<'a, T> Iterator for LineIter<'a, T> {
    type Item = LinePosition<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.next.take()?;
        let item = self.storage.position(cursor);

        let end = item.range.end;
        let bottom = item.y_pos + item.height;
        let more = match self.bound {
            IterBound::Unbounded => true,
            IterBound::Offset(limit) => end < limit,
            IterBound::Y(limit) => bottom < limit,
        };
        if more {
            self.next = self.storage.successor(cursor.id).map(|id| Cursor {
                id,
                start: end,
                y_pos: bottom,
                index: cursor.index + 1,
            });
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_from_lengths(lengths: &[usize]) -> LineStorage<usize> {
        let mut storage = LineStorage::new();
        let mut offset = 0;
        for (i, &len) in lengths.iter().enumerate() {
            storage.insert(i, offset, len, 10.0);
            offset += len;
        }
        storage
    }

    #[test]
    fn test_empty_storage() {
        let storage: LineStorage<()> = LineStorage::new();
        assert!(storage.is_empty());
        assert!(storage.get_line(0).is_none());
        assert!(storage.get_line_at_y(0.0).is_none());
        assert!(storage.first().is_none());
        assert_eq!(storage.iter().count(), 0);
        assert!(storage.validate().is_ok());
    }

    #[test]
    fn test_sequential_inserts_resolve_offsets() {
        let storage = storage_from_lengths(&[4, 1, 6, 3]);
        assert_eq!(storage.count(), 4);
        assert_eq!(storage.length(), 14);
        assert_eq!(storage.height(), 40.0);
        storage.validate().unwrap();

        let line = storage.get_line(5).unwrap();
        assert_eq!((line.index, line.range.clone(), line.y_pos), (2, 5..11, 20.0));
        assert_eq!(*line.data, 2);

        assert_eq!(storage.get_line(0).unwrap().index, 0);
        assert_eq!(storage.get_line(4).unwrap().index, 1);
        // End of the document resolves to the last line.
        assert_eq!(storage.get_line(14).unwrap().index, 3);
        assert!(storage.get_line(15).is_none());
    }

    #[test]
    fn test_lookup_by_y_and_index() {
        let storage = storage_from_lengths(&[2, 2, 2]);
        assert_eq!(storage.get_line_at_y(0.0).unwrap().index, 0);
        assert_eq!(storage.get_line_at_y(9.9).unwrap().index, 0);
        assert_eq!(storage.get_line_at_y(10.0).unwrap().index, 1);
        assert_eq!(storage.get_line_at_y(29.0).unwrap().index, 2);
        assert!(storage.get_line_at_y(30.0).is_none());
        assert!(storage.get_line_at_y(-1.0).is_none());

        let line = storage.get_line_at_index(2).unwrap();
        assert_eq!(line.range, 4..6);
        assert_eq!(line.y_pos, 20.0);
        assert!(storage.get_line_at_index(3).is_none());
        assert_eq!(storage.last().unwrap().index, 2);
    }

    #[test]
    fn test_insert_in_the_middle_shifts_following_lines() {
        let mut storage = storage_from_lengths(&[3, 3]);
        storage.insert(99, 3, 5, 20.0);
        storage.validate().unwrap();

        let lines: Vec<_> = storage.iter().map(|l| (*l.data, l.range)).collect();
        assert_eq!(lines, vec![(0, 0..3), (99, 3..8), (1, 8..11)]);
        assert_eq!(storage.get_line(9).unwrap().y_pos, 30.0);
    }

    #[test]
    fn test_update_and_delete() {
        let mut storage = storage_from_lengths(&[3, 3, 3]);
        assert!(storage.update(4, 2, 5.0));
        assert_eq!(storage.get_line(3).unwrap().range, 3..8);
        assert_eq!(storage.get_line(8).unwrap().y_pos, 25.0);

        assert_eq!(storage.delete(4), Some(1));
        storage.validate().unwrap();
        assert_eq!(storage.count(), 2);
        assert_eq!(storage.length(), 6);
        assert_eq!(storage.get_line(3).unwrap().data, &2);

        assert!(!storage.update(100, 1, 0.0));
        assert_eq!(storage.delete_at_index(5), None);
    }

    #[test]
    fn test_lines_in_range_and_y_window() {
        let storage = storage_from_lengths(&[4, 4, 4, 4]);
        let hits: Vec<_> = storage.lines_in_range(3..9).map(|l| l.index).collect();
        assert_eq!(hits, vec![0, 1, 2]);
        let hits: Vec<_> = storage.lines_in_range(4..8).map(|l| l.index).collect();
        assert_eq!(hits, vec![1]);
        let hits: Vec<_> = storage.lines_in_range(5..5).map(|l| l.index).collect();
        assert_eq!(hits, vec![1]);

        let window: Vec<_> = storage.lines_starting_at(15.0, 30.0).map(|l| l.index).collect();
        assert_eq!(window, vec![1, 2]);

        // Iterators are restartable by cloning.
        let iter = storage.iter_from_index(2);
        assert_eq!(iter.clone().count(), 2);
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn test_build_is_balanced_and_ordered() {
        for count in [1usize, 2, 3, 4, 7, 8, 9, 100, 1000] {
            let storage = LineStorage::build((0..count).map(|i| (i, i % 5 + 1, 1.0)));
            storage.validate().unwrap_or_else(|e| panic!("count {count}: {e}"));
            assert_eq!(storage.count(), count);
            let data: Vec<_> = storage.iter().map(|l| *l.data).collect();
            assert_eq!(data, (0..count).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_delete_everything_in_mixed_order() {
        let mut storage = LineStorage::build((0..64).map(|i| (i, 2, 1.0)));
        let mut remaining = 64;
        while remaining > 0 {
            let index = (remaining * 7 + 3) % remaining;
            storage.delete_at_index(index).unwrap();
            remaining -= 1;
            storage.validate().unwrap();
            assert_eq!(storage.count(), remaining);
            assert_eq!(storage.length(), remaining * 2);
        }
        assert!(storage.is_empty());
    }

    #[test]
    fn test_set_height_and_data_mut() {
        let mut storage = storage_from_lengths(&[2, 2]);
        assert!(storage.set_height_at_index(0, 25.0));
        assert_eq!(storage.get_line_at_index(1).unwrap().y_pos, 25.0);
        assert!(storage.set_height(3, 5.0));
        assert_eq!(storage.height(), 30.0);

        *storage.data_mut(3).unwrap() = 42;
        assert_eq!(*storage.get_line_at_index(1).unwrap().data, 42);
        *storage.data_mut_at_index(0).unwrap() = 7;
        assert_eq!(*storage.first().unwrap().data, 7);
    }
}
