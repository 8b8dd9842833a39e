//! Навигация и ориентация по ансамблям.
//!
//! Внешний ряд уже приведён к времени ансамблей; здесь проверяется только
//! длина. Без навигации ориентация берётся из переменного лидера, а
//! положение считается нулевым.

use adcp_types::{AdcpResult, Series, VariableLeader};
use serde::{Deserialize, Serialize};

use crate::config::OrientationConfig;

/// Внешний ряд положения и ориентации.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Navigation {
    pub x: Series,
    pub y: Series,
    pub z: Series,
    /// Градусы; `None`: из переменного лидера
    pub pitch: Option<Series>,
    pub roll: Option<Series>,
    pub heading: Option<Series>,
}

/// Ориентация по ансамблям, градусы.
#[derive(Debug, Clone, PartialEq)]
pub struct Attitude {
    pub heading: Vec<f64>,
    pub pitch: Vec<f64>,
    pub roll: Vec<f64>,
}

/// Положение опорной точки по ансамблям, м.
#[derive(Debug, Clone, PartialEq)]
pub struct Positions {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl Navigation {
    /// Положение, развёрнутое на `n` ансамблей.
    pub fn positions(
        &self,
        n: usize,
    ) -> AdcpResult<Positions> {
        Ok(Positions {
            x: self.x.broadcast(n)?,
            y: self.y.broadcast(n)?,
            z: self.z.broadcast(n)?,
        })
    }

    /// Проверяет, что все ряды совпадают по длине с числом ансамблей.
    pub fn validate(
        &self,
        n: usize,
    ) -> AdcpResult<()> {
        self.positions(n)?;
        for s in [&self.pitch, &self.roll, &self.heading].into_iter().flatten() {
            s.broadcast(n)?;
        }
        Ok(())
    }
}

impl Attitude {
    /// Ориентация из переменных лидеров.
    pub fn from_leaders(leaders: &[VariableLeader]) -> Self {
        Self {
            heading: leaders.iter().map(VariableLeader::heading_deg).collect(),
            pitch: leaders.iter().map(VariableLeader::pitch_deg).collect(),
            roll: leaders.iter().map(VariableLeader::roll_deg).collect(),
        }
    }

    /// Итоговая ориентация: навигация поверх лидеров, затем склонение,
    /// поправка курса и отключение наклонов.
    pub fn resolve(
        leaders: &[VariableLeader],
        navigation: Option<&Navigation>,
        orientation: &OrientationConfig,
    ) -> AdcpResult<Self> {
        let n = leaders.len();
        let mut att = Self::from_leaders(leaders);

        if let Some(nav) = navigation {
            if let Some(h) = &nav.heading {
                att.heading = h.broadcast(n)?;
            }
            if let Some(p) = &nav.pitch {
                att.pitch = p.broadcast(n)?;
            }
            if let Some(r) = &nav.roll {
                att.roll = r.broadcast(n)?;
            }
        }

        let correction = orientation.magnetic_declination + orientation.heading_bias;
        for h in &mut att.heading {
            *h = (*h + correction).rem_euclid(360.0);
        }

        if !orientation.use_tilt {
            att.pitch.fill(0.0);
            att.roll.fill(0.0);
        }

        Ok(att)
    }

    pub fn len(&self) -> usize {
        self.heading.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heading.is_empty()
    }
}

impl Positions {
    pub fn origin(n: usize) -> Self {
        Self {
            x: vec![0.0; n],
            y: vec![0.0; n],
            z: vec![0.0; n],
        }
    }

    pub fn resolve(
        n: usize,
        navigation: Option<&Navigation>,
    ) -> AdcpResult<Self> {
        match navigation {
            Some(nav) => nav.positions(n),
            None => Ok(Self::origin(n)),
        }
    }

    pub fn at(
        &self,
        e: usize,
    ) -> [f64; 3] {
        [self.x[e], self.y[e], self.z[e]]
    }
}
