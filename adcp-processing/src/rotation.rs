//! Малые матрицы для поворотов и преобразования лучей.
//!
//! Хранение построчное: `m[строка][столбец]`.

/// Матрица 3×3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    pub m: [[f64; 3]; 3],
}

/// Матрица 4×4 (лучи → X, Y, Z, ошибка).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    pub m: [[f64; 4]; 4],
}

impl Matrix3 {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Поворот вокруг оси Z (против часовой стрелки, радианы).
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        }
    }

    /// Матрица ориентации прибора (курс, тангаж, крен в градусах):
    /// переводит X/Y/Z прибора в East/North/Up.
    ///
    /// Тангаж поправляется на крен: `P = atan(tan(pitch)·cos(roll))`.
    pub fn attitude(
        heading_deg: f64,
        pitch_deg: f64,
        roll_deg: f64,
    ) -> Self {
        let roll = roll_deg.to_radians();
        let pitch = (pitch_deg.to_radians().tan() * roll.cos()).atan();
        let (sh, ch) = heading_deg.to_radians().sin_cos();
        let (sp, cp) = pitch.sin_cos();
        let (sr, cr) = roll.sin_cos();

        Self {
            m: [
                [ch * cr + sh * sp * sr, sh * cp, ch * sr - sh * sp * cr],
                [-sh * cr + ch * sp * sr, ch * cp, -sh * sr - ch * sp * cr],
                [-cp * sr, sp, cp * cr],
            ],
        }
    }

    /// Поворот только по курсу (судно → земля).
    pub fn heading(heading_deg: f64) -> Self {
        let (sh, ch) = heading_deg.to_radians().sin_cos();
        Self {
            m: [[ch, sh, 0.0], [-sh, ch, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn mul_vec(
        &self,
        v: [f64; 3],
    ) -> [f64; 3] {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    pub fn mul_mat(
        &self,
        other: &Self,
    ) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = (0..3).map(|k| self.m[i][k] * other.m[k][j]).sum();
            }
        }
        Self { m: out }
    }

    pub fn transpose(&self) -> Self {
        let m = &self.m;
        Self {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }
}

impl Matrix4 {
    pub fn mul_vec(
        &self,
        v: [f64; 4],
    ) -> [f64; 4] {
        let mut out = [0.0; 4];
        for (o, row) in out.iter_mut().zip(&self.m) {
            *o = row.iter().zip(&v).map(|(a, b)| a * b).sum();
        }
        out
    }

    /// Обратная матрица (Гаусс–Жордан с выбором ведущего элемента).
    /// `None` для вырожденной матрицы.
    pub fn inverse(&self) -> Option<Self> {
        let mut a = self.m;
        let mut inv = [[0.0; 4]; 4];
        for (i, row) in inv.iter_mut().enumerate() {
            row[i] = 1.0;
        }

        for col in 0..4 {
            let pivot = (col..4).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
            if a[pivot][col].abs() < 1e-12 {
                return None;
            }
            a.swap(col, pivot);
            inv.swap(col, pivot);

            let p = a[col][col];
            for j in 0..4 {
                a[col][j] /= p;
                inv[col][j] /= p;
            }

            for row in 0..4 {
                if row == col {
                    continue;
                }
                let f = a[row][col];
                for j in 0..4 {
                    a[row][j] -= f * a[col][j];
                    inv[row][j] -= f * inv[col][j];
                }
            }
        }

        Some(Self { m: inv })
    }
}
