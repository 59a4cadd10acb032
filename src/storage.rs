//! Sauvegarde du planning entre deux invocations de la CLI : effectifs avec
//! leur score et historique de fatigue, attributions, congés et repos pris.
//!
//! Le moteur ne persiste rien lui-même ; seul l'appelant passe par ici.

use crate::model::Roster;
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub trait Storage {
    /// Relit le planning tel qu'il a été sauvegardé, fatigue comprise.
    fn load(&self) -> anyhow::Result<Roster>;
    /// Un lecteur concurrent voit l'ancien planning ou le nouveau, jamais un
    /// fichier tronqué.
    fn save(&self, roster: &Roster) -> anyhow::Result<()>;

    /// Planning vide tant que rien n'a été importé.
    fn load_or_default(&self) -> anyhow::Result<Roster>;
}

/// Planning sérialisé en JSON dans un seul fichier.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonStorage {
    fn load(&self) -> anyhow::Result<Roster> {
        let data =
            fs::read(&self.path).with_context(|| format!("reading {}", self.path.display()))?;
        let roster: Roster = serde_json::from_slice(&data)
            .with_context(|| format!("parsing roster {}", self.path.display()))?;
        Ok(roster)
    }

    fn save(&self, roster: &Roster) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(roster)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        // même répertoire que la cible : le rename reste sur un seul système de fichiers
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file next to {}", self.path.display()))?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing roster {}", self.path.display()))?;
        tracing::debug!(
            path = %self.path.display(),
            staff = roster.staff.len(),
            shifts = roster.shifts.len(),
            "roster saved"
        );
        Ok(())
    }

    fn load_or_default(&self) -> anyhow::Result<Roster> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no roster yet, starting empty");
            return Ok(Roster::default());
        }
        self.load()
    }
}
