//! Command line handlers: one function per subcommand, printing plain tables

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::api::{ApiError, LibraryApi};
use crate::cli::{
    AbonneFields, AbonnesAction, Commands, DocumentFields, DocumentsAction, EmpruntsAction,
    ExportArgs,
};
use crate::config::Config;
use crate::export::{self, ExportTable};
use crate::forms::{AbonneForm, DocumentForm, EmpruntForm};
use crate::models::{
    display_date, display_datetime, Abonne, Document, DocumentQuery, Emprunt, LoanStatus,
};
use crate::text::fit;
use crate::views::{AbonnesView, DocumentsView, EmpruntsView};

/// Run a non-interactive command
pub async fn run(command: &Commands, api: &dyn LibraryApi, config: &Config) -> Result<()> {
    match command {
        Commands::Stats => show_stats(api).await,
        Commands::Documents { action } => documents(action, api, config).await,
        Commands::Abonnes { action } => abonnes(action, api, config).await,
        Commands::Emprunts { action } => emprunts(action, api, config).await,
        Commands::Tui => Err(anyhow::anyhow!("The terminal UI is started from main")),
    }
}

async fn show_stats(api: &dyn LibraryApi) -> Result<()> {
    let stats = api.stats().await.context("Failed to load statistics")?;
    println!("Documents:          {}", stats.total_documents);
    if let (Some(dispo), Some(empruntes)) = (stats.total_documents_dispo, stats.total_documents_empruntes) {
        println!("  disponibles:      {}", dispo);
        println!("  empruntés:        {}", empruntes);
    }
    println!("Abonnés:            {}", stats.total_abonnes);
    println!("Emprunts en cours:  {}", stats.emprunts_en_cours);
    println!("Emprunts en retard: {}", stats.emprunts_en_retard);
    Ok(())
}

async fn documents(action: &DocumentsAction, api: &dyn LibraryApi, config: &Config) -> Result<()> {
    match action {
        DocumentsAction::List { list, status, doc_type } => {
            let availability = Commands::parse_availability(status)?;
            let query = DocumentQuery {
                doc_type: doc_type.as_deref().map(Commands::parse_document_type).transpose()?,
                disponible: availability.as_query(),
            };
            let mut view = DocumentsView::new();
            view.reload_matching(api, &query)
                .await
                .context("Failed to load documents")?;
            view.query = list.search.clone().unwrap_or_default();
            view.availability = availability;
            if let Some(sort) = Commands::document_sort(list)? {
                view.sort = sort;
            }
            print_documents(&view.visible());
        }
        DocumentsAction::Show { id } => {
            let document = api
                .get_document(id)
                .await
                .map_err(|e| lookup_error(e, "Document", id))?;
            println!("Id:           {}", document.id);
            println!("Titre:        {}", document.titre);
            println!("Auteur:       {}", document.auteur);
            println!("Type:         {}", document.doc_type.as_str());
            println!("ISBN:         {}", document.isbn);
            println!("Publication:  {}", display_date(document.date_publication));
            println!("Statut:       {}", document.availability_label());
        }
        DocumentsAction::Add { fields } => {
            let mut form = DocumentForm::default();
            fill_document_form(&mut form, fields);
            let payload = form.validate().context("Document rejected")?;
            let id = api
                .create_document(&payload)
                .await
                .context("Failed to create document")?;
            info!("Document created: {}", id);
            println!("Created document {}", id);
        }
        DocumentsAction::Update { id, fields } => {
            let current = api
                .get_document(id)
                .await
                .map_err(|e| lookup_error(e, "Document", id))?;
            let mut form = DocumentForm::from_document(&current);
            fill_document_form(&mut form, fields);
            let payload = form.validate().context("Document rejected")?;
            api.update_document(id, &payload)
                .await
                .with_context(|| format!("Failed to update document {}", id))?;
            println!("Updated document {}", id);
        }
        DocumentsAction::Delete { id, yes } => {
            if !confirmed(*yes, &format!("Delete document {}?", id))? {
                println!("Cancelled");
                return Ok(());
            }
            api.delete_document(id)
                .await
                .with_context(|| format!("Failed to delete document {}", id))?;
            println!("Deleted document {}", id);
        }
        DocumentsAction::Export { export } => {
            let mut view = DocumentsView::new();
            view.reload(api).await.context("Failed to load documents")?;
            view.query = export.search.clone().unwrap_or_default();
            let table = export::documents_table(view.visible());
            write_export(&table, export, config)?;
        }
    }
    Ok(())
}

async fn abonnes(action: &AbonnesAction, api: &dyn LibraryApi, config: &Config) -> Result<()> {
    match action {
        AbonnesAction::List { list } => {
            let mut view = AbonnesView::new();
            view.reload(api).await.context("Failed to load subscribers")?;
            view.query = list.search.clone().unwrap_or_default();
            if let Some(sort) = Commands::abonne_sort(list)? {
                view.sort = sort;
            }
            print_abonnes(&view.visible());
        }
        AbonnesAction::Show { id } => {
            let abonne = api
                .get_abonne(id)
                .await
                .map_err(|e| lookup_error(e, "Subscriber", id))?;
            println!("Id:           {}", abonne.id);
            println!("Nom:          {}", abonne.nom);
            println!("Prénom:       {}", abonne.prenom);
            println!("Email:        {}", abonne.email);
            println!("Téléphone:    {}", abonne.telephone);
            println!("Adresse:      {}", abonne.adresse);
            println!("Inscription:  {}", display_datetime(abonne.date_inscription));
            println!("Emprunts:     {}", abonne.active_loan_count());
        }
        AbonnesAction::Add { fields } => {
            let mut form = AbonneForm::default();
            fill_abonne_form(&mut form, fields);
            let payload = form.validate().context("Subscriber rejected")?;
            let id = api
                .create_abonne(&payload)
                .await
                .context("Failed to create subscriber")?;
            info!("Subscriber created: {}", id);
            println!("Created subscriber {}", id);
        }
        AbonnesAction::Update { id, fields } => {
            let current = api
                .get_abonne(id)
                .await
                .map_err(|e| lookup_error(e, "Subscriber", id))?;
            let mut form = AbonneForm::from_abonne(&current);
            fill_abonne_form(&mut form, fields);
            let payload = form.validate().context("Subscriber rejected")?;
            api.update_abonne(id, &payload)
                .await
                .with_context(|| format!("Failed to update subscriber {}", id))?;
            println!("Updated subscriber {}", id);
        }
        AbonnesAction::Delete { id, yes } => {
            if !confirmed(*yes, &format!("Delete subscriber {}?", id))? {
                println!("Cancelled");
                return Ok(());
            }
            api.delete_abonne(id)
                .await
                .with_context(|| format!("Failed to delete subscriber {}", id))?;
            println!("Deleted subscriber {}", id);
        }
        AbonnesAction::Loans { id } => {
            let mut view = EmpruntsView::new();
            view.reload_for_abonne(api, id)
                .await
                .with_context(|| format!("Failed to load loans of subscriber {}", id))?;
            print_emprunts(&view.visible());
        }
        AbonnesAction::Export { export } => {
            let mut view = AbonnesView::new();
            view.reload(api).await.context("Failed to load subscribers")?;
            view.query = export.search.clone().unwrap_or_default();
            let table = export::abonnes_table(view.visible());
            write_export(&table, export, config)?;
        }
    }
    Ok(())
}

async fn emprunts(action: &EmpruntsAction, api: &dyn LibraryApi, config: &Config) -> Result<()> {
    match action {
        EmpruntsAction::List { list, status } => {
            let mut view = EmpruntsView::new();
            view.reload(api).await.context("Failed to load loans")?;
            view.query = list.search.clone().unwrap_or_default();
            view.status = Commands::parse_status(status)?;
            if let Some(sort) = Commands::emprunt_sort(list)? {
                view.sort = sort;
            }
            print_emprunts(&view.visible());
        }
        EmpruntsAction::Add { abonne, document } => {
            let form = EmpruntForm {
                abonne_id: Some(abonne.clone()),
                document_id: Some(document.clone()),
            };
            let payload = form.validate().context("Loan rejected")?;

            let target = api
                .get_document(&payload.document_id)
                .await
                .map_err(|e| lookup_error(e, "Document", &payload.document_id))?;
            if !target.disponible {
                return Err(anyhow::anyhow!("Document '{}' is not available", target.titre));
            }

            let id = api
                .create_emprunt(&payload)
                .await
                .context("Failed to create loan")?;
            info!("Loan created: {}", id);
            println!("Created loan {}", id);
        }
        EmpruntsAction::Return { id } => {
            api.return_emprunt(id)
                .await
                .with_context(|| format!("Failed to return loan {}", id))?;
            println!("Returned loan {}", id);
        }
        EmpruntsAction::Delete { id, yes } => {
            if !confirmed(*yes, &format!("Delete loan {}?", id))? {
                println!("Cancelled");
                return Ok(());
            }
            api.delete_emprunt(id)
                .await
                .with_context(|| format!("Failed to delete loan {}", id))?;
            println!("Deleted loan {}", id);
        }
        EmpruntsAction::Overdue => {
            let mut view = EmpruntsView::new();
            view.reload_overdue(api).await.context("Failed to load overdue loans")?;
            let disagreeing = view
                .records()
                .iter()
                .filter(|e| e.statut != LoanStatus::EnRetard)
                .count();
            if disagreeing > 0 {
                warn!("{} loans reported overdue are not past due locally", disagreeing);
            }
            print_emprunts(&view.visible());
        }
        EmpruntsAction::Export { export, status } => {
            let mut view = EmpruntsView::new();
            view.reload(api).await.context("Failed to load loans")?;
            view.query = export.search.clone().unwrap_or_default();
            view.status = Commands::parse_status(status)?;
            let table = export::emprunts_table(view.visible());
            write_export(&table, export, config)?;
        }
    }
    Ok(())
}

/// A missing record is reported plainly; other failures keep their cause
fn lookup_error(err: ApiError, what: &str, id: &str) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!("{} {} not found", what, id)
    } else {
        anyhow::Error::new(err).context(format!("Failed to load {} {}", what.to_lowercase(), id))
    }
}

fn write_export(table: &ExportTable, args: &ExportArgs, config: &Config) -> Result<()> {
    let format = Commands::parse_export_format(&args.format)?;
    let dir = args
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.export_dir.clone());
    let path = export::export_table(table, format, &dir, Local::now().date_naive())?;
    println!("Exported {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

/// Overlay the options given on the command line onto a form
pub fn fill_document_form(form: &mut DocumentForm, fields: &DocumentFields) {
    if let Some(titre) = &fields.titre {
        form.titre = titre.clone();
    }
    if let Some(auteur) = &fields.auteur {
        form.auteur = auteur.clone();
    }
    if let Some(doc_type) = &fields.doc_type {
        form.doc_type = doc_type.clone();
    }
    if let Some(isbn) = &fields.isbn {
        form.isbn = isbn.clone();
    }
    if let Some(date) = &fields.date_publication {
        form.date_publication = date.clone();
    }
    if let Some(disponible) = fields.disponible {
        form.disponible = disponible;
    }
}

pub fn fill_abonne_form(form: &mut AbonneForm, fields: &AbonneFields) {
    if let Some(nom) = &fields.nom {
        form.nom = nom.clone();
    }
    if let Some(prenom) = &fields.prenom {
        form.prenom = prenom.clone();
    }
    if let Some(email) = &fields.email {
        form.email = email.clone();
    }
    if let Some(telephone) = &fields.telephone {
        form.telephone = telephone.clone();
    }
    if let Some(adresse) = &fields.adresse {
        form.adresse = adresse.clone();
    }
}

fn confirmed(skip_prompt: bool, prompt: &str) -> Result<bool> {
    if skip_prompt {
        return Ok(true);
    }
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    confirm(prompt, &mut stdin.lock(), &mut stdout)
}

/// Ask a yes/no question; anything but y/yes/o/oui is a no
pub fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("Failed to read confirmation")?;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "o" | "oui"
    ))
}

fn print_documents(documents: &[&Document]) {
    println!("Found {} documents:", documents.len());
    println!(
        "{:<26} {:<36} {:<20} {:<9} {:<18} {:<10}",
        "ID", "Titre", "Auteur", "Type", "ISBN", "Statut"
    );
    println!("{}", "-".repeat(124));
    for document in documents {
        println!(
            "{} {} {} {} {} {}",
            fit(&document.id, 26),
            fit(&document.titre, 36),
            fit(&document.auteur, 20),
            fit(document.doc_type.as_str(), 9),
            fit(&document.isbn, 18),
            document.availability_label()
        );
    }
}

fn print_abonnes(abonnes: &[&Abonne]) {
    println!("Found {} subscribers:", abonnes.len());
    println!(
        "{:<26} {:<30} {:<30} {:<14} {:<12} {:<8}",
        "ID", "Nom", "Email", "Téléphone", "Inscription", "Emprunts"
    );
    println!("{}", "-".repeat(125));
    for abonne in abonnes {
        println!(
            "{} {} {} {} {} {}",
            fit(&abonne.id, 26),
            fit(&abonne.full_name(), 30),
            fit(&abonne.email, 30),
            fit(&abonne.telephone, 14),
            fit(&display_datetime(abonne.date_inscription), 12),
            abonne.active_loan_count()
        );
    }
}

fn print_emprunts(emprunts: &[&Emprunt]) {
    println!("Found {} loans:", emprunts.len());
    println!(
        "{:<26} {:<30} {:<24} {:<11} {:<11} {:<11} {:<10}",
        "ID", "Document", "Abonné", "Emprunt", "Retour prévu", "Retourné", "Statut"
    );
    println!("{}", "-".repeat(130));
    for emprunt in emprunts {
        println!(
            "{} {} {} {} {} {} {}",
            fit(&emprunt.id, 26),
            fit(emprunt.document_title(), 30),
            fit(&emprunt.abonne_full_name(), 24),
            fit(&display_datetime(emprunt.date_emprunt), 11),
            fit(&display_datetime(emprunt.date_retour_prevue), 11),
            fit(&display_datetime(emprunt.date_retour_effective), 11),
            emprunt.statut.label()
        );
    }
}
