//! Плотные массивы фиксированной формы для данных по ансамблям.
//!
//! Хранение построчное: последний индекс меняется быстрее всего, что
//! совпадает с порядком `ячейка × луч` в секциях PD0.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Двумерный массив `[n0 × n1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array2<T> {
    shape: (usize, usize),
    data: Vec<T>,
}

/// Трёхмерный массив `[n0 × n1 × n2]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array3<T> {
    shape: (usize, usize, usize),
    data: Vec<T>,
}

impl<T: Clone> Array2<T> {
    pub fn from_elem(
        shape: (usize, usize),
        value: T,
    ) -> Self {
        Self {
            shape,
            data: vec![value; shape.0 * shape.1],
        }
    }

    /// Обрезает массив по первой оси до `n0` строк.
    pub fn truncate(
        &mut self,
        n0: usize,
    ) {
        let n0 = n0.min(self.shape.0);
        self.data.truncate(n0 * self.shape.1);
        self.shape.0 = n0;
    }
}

impl<T> Array2<T> {
    pub fn from_fn<F: FnMut(usize, usize) -> T>(
        shape: (usize, usize),
        mut f: F,
    ) -> Self {
        let mut data = Vec::with_capacity(shape.0 * shape.1);
        for i in 0..shape.0 {
            for j in 0..shape.1 {
                data.push(f(i, j));
            }
        }
        Self { shape, data }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn row(
        &self,
        i: usize,
    ) -> &[T] {
        &self.data[i * self.shape.1..(i + 1) * self.shape.1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn map<U, F: FnMut(&T) -> U>(
        &self,
        f: F,
    ) -> Array2<U> {
        Array2 {
            shape: self.shape,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Поэлементное объединение двух массивов одной формы.
    pub fn zip_map<U, V, F: FnMut(&T, &U) -> V>(
        &self,
        other: &Array2<U>,
        mut f: F,
    ) -> Array2<V> {
        assert_eq!(self.shape, other.shape(), "shape mismatch");
        Array2 {
            shape: self.shape,
            data: self
                .data
                .iter()
                .zip(other.as_slice())
                .map(|(a, b)| f(a, b))
                .collect(),
        }
    }
}

impl<T: Clone> Array3<T> {
    pub fn from_elem(
        shape: (usize, usize, usize),
        value: T,
    ) -> Self {
        Self {
            shape,
            data: vec![value; shape.0 * shape.1 * shape.2],
        }
    }

    /// Обрезает массив по первой оси до `n0` плоскостей.
    pub fn truncate(
        &mut self,
        n0: usize,
    ) {
        let n0 = n0.min(self.shape.0);
        self.data.truncate(n0 * self.shape.1 * self.shape.2);
        self.shape.0 = n0;
    }
}

impl<T> Array3<T> {
    /// Собирает массив из готового вектора; длина должна совпадать с формой.
    pub fn from_vec(
        shape: (usize, usize, usize),
        data: Vec<T>,
    ) -> Option<Self> {
        (data.len() == shape.0 * shape.1 * shape.2).then_some(Self { shape, data })
    }

    pub fn from_fn<F: FnMut(usize, usize, usize) -> T>(
        shape: (usize, usize, usize),
        mut f: F,
    ) -> Self {
        let mut data = Vec::with_capacity(shape.0 * shape.1 * shape.2);
        for i in 0..shape.0 {
            for j in 0..shape.1 {
                for k in 0..shape.2 {
                    data.push(f(i, j, k));
                }
            }
        }
        Self { shape, data }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Плоскость `[n1 × n2]` для индекса `i` первой оси.
    pub fn plane(
        &self,
        i: usize,
    ) -> &[T] {
        let n = self.shape.1 * self.shape.2;
        &self.data[i * n..(i + 1) * n]
    }

    /// Вектор по последней оси.
    pub fn lane(
        &self,
        i: usize,
        j: usize,
    ) -> &[T] {
        let start = (i * self.shape.1 + j) * self.shape.2;
        &self.data[start..start + self.shape.2]
    }

    pub fn lane_mut(
        &mut self,
        i: usize,
        j: usize,
    ) -> &mut [T] {
        let start = (i * self.shape.1 + j) * self.shape.2;
        &mut self.data[start..start + self.shape.2]
    }

    /// Дописывает плоскость в конец первой оси.
    pub fn push_plane<I: IntoIterator<Item = T>>(
        &mut self,
        plane: I,
    ) {
        let before = self.data.len();
        self.data.extend(plane);
        assert_eq!(
            self.data.len() - before,
            self.shape.1 * self.shape.2,
            "plane size mismatch"
        );
        self.shape.0 += 1;
    }

    /// Пустой массив с заданными внутренними размерами.
    pub fn with_inner(
        n1: usize,
        n2: usize,
        capacity: usize,
    ) -> Self {
        Self {
            shape: (0, n1, n2),
            data: Vec::with_capacity(capacity * n1 * n2),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn map<U, F: FnMut(&T) -> U>(
        &self,
        f: F,
    ) -> Array3<U> {
        Array3 {
            shape: self.shape,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn zip_map<U, V, F: FnMut(&T, &U) -> V>(
        &self,
        other: &Array3<U>,
        mut f: F,
    ) -> Array3<V> {
        assert_eq!(self.shape, other.shape(), "shape mismatch");
        Array3 {
            shape: self.shape,
            data: self
                .data
                .iter()
                .zip(other.as_slice())
                .map(|(a, b)| f(a, b))
                .collect(),
        }
    }
}

impl<T> Index<(usize, usize)> for Array2<T> {
    type Output = T;

    fn index(
        &self,
        (i, j): (usize, usize),
    ) -> &T {
        &self.data[i * self.shape.1 + j]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2<T> {
    fn index_mut(
        &mut self,
        (i, j): (usize, usize),
    ) -> &mut T {
        &mut self.data[i * self.shape.1 + j]
    }
}

impl<T> Index<(usize, usize, usize)> for Array3<T> {
    type Output = T;

    fn index(
        &self,
        (i, j, k): (usize, usize, usize),
    ) -> &T {
        &self.data[(i * self.shape.1 + j) * self.shape.2 + k]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Array3<T> {
    fn index_mut(
        &mut self,
        (i, j, k): (usize, usize, usize),
    ) -> &mut T {
        &mut self.data[(i * self.shape.1 + j) * self.shape.2 + k]
    }
}
